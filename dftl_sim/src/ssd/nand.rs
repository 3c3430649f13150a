use crate::{
  conf::SsdConf,
  ssd::{Ssd, addr::Ppa},
};

/// Page lifecycle on flash.
/// 闪存页的生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PgStatus {
  Free = 0,
  Invalid = 1,
  Valid = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SecStatus {
  Free = 0,
  Invalid = 1,
  Valid = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NandOp {
  Read,
  Write,
  Erase,
}

/// Accounting class of a flash operation. Both charge the same latencies.
/// 闪存操作的记账类别。两者计费延迟相同。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
  User,
  Gc,
}

#[derive(Debug, Clone, Copy)]
pub struct NandCmd {
  pub io: IoKind,
  pub op: NandOp,
  /// Submission timestamp in ns. Zero means "now".
  /// 提交时间戳（纳秒）。零表示“当前时刻”。
  pub stime: u64,
}

pub struct NandPage {
  pub sec: Box<[SecStatus]>,
  pub status: PgStatus,
}

impl NandPage {
  pub fn new(spp: &SsdConf) -> Self {
    NandPage {
      sec: vec![SecStatus::Free; spp.secs_per_pg].into_boxed_slice(),
      status: PgStatus::Free,
    }
  }
}

pub struct NandBlock {
  pub pg: Vec<NandPage>,
  pub ipc: usize,
  pub vpc: usize,
  pub erase_cnt: usize,
  /// Next program offset within the block.
  /// 块内下一个编程位置。
  pub wp: usize,
}

impl NandBlock {
  pub fn new(spp: &SsdConf) -> Self {
    NandBlock {
      pg: (0..spp.pgs_per_blk).map(|_| NandPage::new(spp)).collect(),
      ipc: 0,
      vpc: 0,
      erase_cnt: 0,
      wp: 0,
    }
  }
}

pub struct NandPlane {
  pub blk: Vec<NandBlock>,
}

impl NandPlane {
  pub fn new(spp: &SsdConf) -> Self {
    NandPlane {
      blk: (0..spp.blks_per_pl).map(|_| NandBlock::new(spp)).collect(),
    }
  }
}

pub struct NandLun {
  pub pl: Vec<NandPlane>,
  pub next_lun_avail_time: u64,
  pub busy: bool,
  pub gc_endtime: u64,
}

impl NandLun {
  pub fn new(spp: &SsdConf) -> Self {
    NandLun {
      pl: (0..spp.pls_per_lun).map(|_| NandPlane::new(spp)).collect(),
      next_lun_avail_time: 0,
      busy: false,
      gc_endtime: 0,
    }
  }
}

pub struct SsdChannel {
  pub lun: Vec<NandLun>,
  pub next_ch_avail_time: u64,
  pub busy: bool,
}

impl SsdChannel {
  pub fn new(spp: &SsdConf) -> Self {
    SsdChannel {
      lun: (0..spp.luns_per_ch).map(|_| NandLun::new(spp)).collect(),
      next_ch_avail_time: 0,
      busy: false,
    }
  }
}

impl Ssd {
  #[inline(always)]
  pub fn get_ch(&self, ppa: Ppa) -> &SsdChannel {
    &self.ch[ppa.ch()]
  }

  #[inline(always)]
  pub fn get_lun(&self, ppa: Ppa) -> &NandLun {
    &self.ch[ppa.ch()].lun[ppa.lun()]
  }

  #[inline(always)]
  pub fn get_lun_mut(&mut self, ppa: Ppa) -> &mut NandLun {
    &mut self.ch[ppa.ch()].lun[ppa.lun()]
  }

  #[inline(always)]
  pub fn get_blk(&self, ppa: Ppa) -> &NandBlock {
    &self.ch[ppa.ch()].lun[ppa.lun()].pl[ppa.pl()].blk[ppa.blk()]
  }

  #[inline(always)]
  pub fn get_blk_mut(&mut self, ppa: Ppa) -> &mut NandBlock {
    &mut self.ch[ppa.ch()].lun[ppa.lun()].pl[ppa.pl()].blk[ppa.blk()]
  }

  #[inline(always)]
  pub fn get_pg(&self, ppa: Ppa) -> &NandPage {
    &self.get_blk(ppa).pg[ppa.pg()]
  }

  #[inline(always)]
  pub fn get_pg_mut(&mut self, ppa: Ppa) -> &mut NandPage {
    let pg = ppa.pg();
    &mut self.get_blk_mut(ppa).pg[pg]
  }

  /// Advance the target LUN clock for one flash op and return how long the
  /// op takes from the caller's submission time.
  /// 为一次闪存操作推进目标 LUN 的时钟，返回从调用方提交时刻算起的耗时。
  pub fn advance_status(&mut self, ppa: Ppa, ncmd: &NandCmd) -> u64 {
    let cmd_stime = if ncmd.stime == 0 {
      self.now_ns()
    } else {
      ncmd.stime
    };
    let (pg_rd_lat, pg_wr_lat, blk_er_lat, ch_xfer_lat) = (
      self.sp.pg_rd_lat,
      self.sp.pg_wr_lat,
      self.sp.blk_er_lat,
      self.sp.ch_xfer_lat,
    );
    let lun = &mut self.ch[ppa.ch()].lun[ppa.lun()];
    let nand_stime = lun.next_lun_avail_time.max(cmd_stime);
    let mut lat;
    match ncmd.op {
      NandOp::Read => {
        lun.next_lun_avail_time = nand_stime + pg_rd_lat;
        lat = lun.next_lun_avail_time - cmd_stime;
      }
      NandOp::Write => {
        // user and GC programs cost the same in this model
        lun.next_lun_avail_time = nand_stime + pg_wr_lat;
        lat = lun.next_lun_avail_time - cmd_stime;
      }
      NandOp::Erase => {
        lun.next_lun_avail_time = nand_stime + blk_er_lat;
        lat = lun.next_lun_avail_time - cmd_stime;
      }
    }
    // transfer stage, idle while the channel cost stays zero
    if ch_xfer_lat > 0 && matches!(ncmd.op, NandOp::Read | NandOp::Write) {
      let lun_done = self.ch[ppa.ch()].lun[ppa.lun()].next_lun_avail_time;
      let chnl = &mut self.ch[ppa.ch()];
      let chnl_stime = chnl.next_ch_avail_time.max(lun_done);
      chnl.next_ch_avail_time = chnl_stime + ch_xfer_lat;
      lat = chnl.next_ch_avail_time - cmd_stime;
    }
    lat
  }
}
