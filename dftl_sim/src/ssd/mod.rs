pub mod addr;
pub mod cmt;
pub mod gc;
pub mod line;
pub mod map;
pub mod nand;
pub mod stats;
pub mod wp;

pub use addr::Ppa;
pub use cmt::{CMT_HASH_SIZE, Cmt, CmtEntry, UNMAPPED_PPN};
pub use line::{Line, LineKind, LineMgr};
pub use map::INVALID_LPN;
pub use nand::{IoKind, NandCmd, NandOp, PgStatus, SecStatus, SsdChannel};
pub use stats::Statistics;
pub use wp::WritePointer;

use std::time::Instant;

use log::error;

use crate::conf::SsdConf;

/// Whole-device FTL state. A single worker thread owns an `Ssd` and is the
/// only writer; nothing in here synchronizes.
/// 整机 FTL 状态。由单个工作线程独占持有并写入，内部不做任何同步。
pub struct Ssd {
  pub sp: SsdConf,
  pub ch: Vec<SsdChannel>,
  /// Forward map, LPN to PPA, dense over every logical page.
  /// 正向映射，LPN 到 PPA，覆盖全部逻辑页的稠密数组。
  pub maptbl: Vec<Ppa>,
  /// Reverse map keyed by flat page index: the LPN for data pages, the TVPN
  /// for translation pages.
  /// 以扁平页索引为键的反向映射：数据页存 LPN，翻译页存 TVPN。
  pub rmap: Vec<u64>,
  /// Global Translation Directory, TVPN to the on-flash translation page.
  /// 全局翻译目录，TVPN 到闪存上翻译页的映射。
  pub gtd: Vec<Ppa>,
  pub cm: Cmt,
  pub lm: LineMgr,
  pub wp: WritePointer,
  pub twp: WritePointer,
  pub stat: Statistics,
  clock: Instant,
}

impl Ssd {
  pub fn new(sp: SsdConf) -> Self {
    let ch = (0..sp.nchs).map(|_| SsdChannel::new(&sp)).collect();
    let maptbl = vec![Ppa::UNMAPPED; sp.tt_pgs];
    let rmap = vec![INVALID_LPN; sp.tt_pgs];
    let gtd = vec![Ppa::UNMAPPED; sp.tt_gtd_size];
    let cm = Cmt::new(sp.tt_cmt_size);
    let mut lm = LineMgr::new(sp.tt_lines);

    // each stream starts on its own free line
    let data_line = lm.pop_free().unwrap_or_else(|| {
      error!("no free line for the data stream");
      panic!("line pool too small");
    });
    lm.lines[data_line].kind = LineKind::Data;
    let trans_line = lm.pop_free().unwrap_or_else(|| {
      error!("no free line for the translation stream");
      panic!("line pool too small");
    });
    lm.lines[trans_line].kind = LineKind::Trans;

    Ssd {
      sp,
      ch,
      maptbl,
      rmap,
      gtd,
      cm,
      lm,
      wp: WritePointer::new(data_line),
      twp: WritePointer::new(trans_line),
      stat: Statistics::default(),
      clock: Instant::now(),
    }
  }

  #[inline(always)]
  pub(crate) fn now_ns(&self) -> u64 {
    self.clock.elapsed().as_nanos() as u64
  }

  pub fn should_gc(&self) -> bool {
    self.lm.free_line_cnt <= self.sp.gc_thres_lines
  }

  pub fn should_gc_high(&self) -> bool {
    self.lm.free_line_cnt <= self.sp.gc_thres_lines_high
  }

  fn translation_page_read(&mut self, ppa: Ppa, stime: u64) -> u64 {
    self.stat.trans_rd_cnt += 1;
    let trd = NandCmd {
      io: IoKind::User,
      op: NandOp::Read,
      stime,
    };
    self.advance_status(ppa, &trd)
  }

  #[inline(always)]
  fn translation_page_read_no_req(&mut self, ppa: Ppa) -> u64 {
    self.translation_page_read(ppa, 0)
  }

  /// Move the translation page behind `old_ppa` to a fresh slot on the
  /// translation stream, retiring the old copy.
  /// 将 `old_ppa` 上的翻译页搬到翻译流的新槽位，并作废旧副本。
  fn translation_page_write(&mut self, old_ppa: Ppa) -> u64 {
    let tvpn = self.get_rmap_ent(old_ppa);
    if old_ppa.is_mapped() {
      self.mark_page_invalid(old_ppa);
      self.set_rmap_ent(INVALID_LPN, old_ppa);
    }
    let new_ppa = self.get_new_trans_page();
    self.set_gtd_ent(tvpn, new_ppa);
    self.set_rmap_ent(tvpn, new_ppa);
    self.mark_page_valid(new_ppa);
    self.advance_trans_write_pointer();
    self.stat.trans_wr_cnt += 1;
    let twr = NandCmd {
      io: IoKind::User,
      op: NandOp::Write,
      stime: 0,
    };
    self.advance_status(new_ppa, &twr)
  }

  /// First materialization of a TVPN that never had an on-flash page.
  /// 首次落盘一个从未有过闪存页的 TVPN。
  fn translation_page_new_write(&mut self, tvpn: u64) -> u64 {
    let new_ppa = self.get_new_trans_page();
    self.set_gtd_ent(tvpn, new_ppa);
    self.set_rmap_ent(tvpn, new_ppa);
    self.mark_page_valid(new_ppa);
    self.advance_trans_write_pointer();
    self.stat.trans_wr_cnt += 1;
    let twr = NandCmd {
      io: IoKind::User,
      op: NandOp::Write,
      stime: 0,
    };
    self.advance_status(new_ppa, &twr)
  }

  /// Evict the LRU entry, writing its translation page back first when the
  /// cached mapping is dirty.
  /// 驱逐 LRU 条目；若缓存映射为脏，先把对应翻译页回写。
  pub fn evict_cmt_entry(&mut self) {
    let idx = self.cm.detach_lru();
    let (lpn, dirty) = {
      let e = self.cm.entry(idx);
      (e.lpn, e.dirty)
    };
    if dirty {
      let tvpn = lpn / self.sp.ents_per_pg as u64;
      let ppa = self.get_gtd_ent(tvpn);
      if !ppa.is_mapped() || !self.sp.valid_ppa(ppa) {
        self.translation_page_new_write(tvpn);
      } else {
        // refresh the old translation page, then relocate it
        self.translation_page_read_no_req(ppa);
        self.translation_page_write(ppa);
      }
    }
    self.cm.release(idx);
  }

  /// Insert after making room, evicting the LRU entry when the pool is at
  /// capacity.
  /// 插入前先腾位置，池满时驱逐 LRU 条目。
  fn cmt_admit(&mut self, lpn: u64, ppn: u64) -> u32 {
    if self.cm.used_cnt < self.cm.tt_entries {
      self.cm.insert(lpn, ppn)
    } else if self.cm.used_cnt == self.cm.tt_entries {
      self.evict_cmt_entry();
      self.cm.insert(lpn, ppn)
    } else {
      error!("cmt used entries exceed total entries");
      panic!("cmt accounting corrupted");
    }
  }

  /// Demand-load the mapping of `lpn` for a read. Returns the (channel,
  /// LUN) that served the translation page, for clock serialization.
  /// 为读请求按需加载 `lpn` 的映射。返回服务翻译页的（通道，LUN），
  /// 用于时钟串行化。
  fn process_translation_page_read(&mut self, lpn: u64, stime: u64) -> Option<(usize, usize)> {
    let tvpn = lpn / self.sp.ents_per_pg as u64;
    let ppa = self.get_gtd_ent(tvpn);
    if !ppa.is_mapped() || !self.sp.valid_ppa(ppa) {
      // nothing on flash yet, cache the hole so the next access hits
      self.cmt_admit(lpn, UNMAPPED_PPN);
      return None;
    }
    self.translation_page_read(ppa, stime);
    let lun_pos = (ppa.ch(), ppa.lun());

    let dppa = self.get_maptbl_ent(lpn);
    if !dppa.is_mapped() || !self.sp.valid_ppa(dppa) {
      return None;
    }
    let ppn = self.sp.ppa2pgidx(dppa);
    self.cmt_admit(lpn, ppn);
    Some(lun_pos)
  }

  /// Demand-load the mapping of `lpn` for a write and return the CMT slot
  /// the write path will update. A fresh TVPN costs no flash read.
  /// 为写请求按需加载 `lpn` 的映射，返回写路径将更新的 CMT 槽位。
  /// 全新 TVPN 不产生闪存读。
  fn process_translation_page_write(&mut self, lpn: u64, stime: u64) -> u32 {
    let tvpn = lpn / self.sp.ents_per_pg as u64;
    let ppa = self.get_gtd_ent(tvpn);
    if !ppa.is_mapped() || !self.sp.valid_ppa(ppa) {
      return self.cmt_admit(lpn, UNMAPPED_PPN);
    }
    self.translation_page_read(ppa, stime);
    let dppa = self.get_maptbl_ent(lpn);
    if !dppa.is_mapped() || !self.sp.valid_ppa(dppa) {
      self.cmt_admit(lpn, UNMAPPED_PPN)
    } else {
      let ppn = self.sp.ppa2pgidx(dppa);
      self.cmt_admit(lpn, ppn)
    }
  }

  fn lpn_range(&self, lba: u64, nlb: u32) -> Option<(u64, u64)> {
    if nlb == 0 {
      return None;
    }
    let secs_per_pg = self.sp.secs_per_pg as u64;
    let start_lpn = lba / secs_per_pg;
    let mut end_lpn = (lba + nlb as u64 - 1) / secs_per_pg;
    if end_lpn as usize >= self.sp.tt_pgs {
      error!(
        "request past the device: start_lpn={} tt_pgs={}",
        start_lpn, self.sp.tt_pgs
      );
      end_lpn = self.sp.tt_pgs as u64 - 1;
    }
    if start_lpn > end_lpn {
      return None;
    }
    Some((start_lpn, end_lpn))
  }

  /// Read path. Returns the worst per-page latency of the request.
  /// 读路径。返回请求内各页延迟的最大值。
  pub fn read(&mut self, lba: u64, nlb: u32, stime: u64) -> u64 {
    let Some((start_lpn, end_lpn)) = self.lpn_range(lba, nlb) else {
      return 0;
    };
    let mut maxlat = 0;
    for lpn in start_lpn..=end_lpn {
      self.stat.access_cnt += 1;
      let ppa;
      if self.cm.hit(lpn).is_some() {
        self.stat.cmt_hit_cnt += 1;
        ppa = self.get_maptbl_ent(lpn);
        if !ppa.is_mapped() || !self.sp.valid_ppa(ppa) {
          continue;
        }
      } else {
        self.stat.cmt_miss_cnt += 1;
        let old_lun = self.process_translation_page_read(lpn, stime);
        ppa = self.get_maptbl_ent(lpn);
        if !ppa.is_mapped() || !self.sp.valid_ppa(ppa) {
          continue;
        }
        // the data read waits for its translation page to come off flash
        if let Some((oc, ol)) = old_lun {
          let trans_done = self.ch[oc].lun[ol].next_lun_avail_time;
          let lun = &mut self.ch[ppa.ch()].lun[ppa.lun()];
          lun.next_lun_avail_time = lun.next_lun_avail_time.max(trans_done);
        }
      }
      let srd = NandCmd {
        io: IoKind::User,
        op: NandOp::Read,
        stime,
      };
      let sublat = self.advance_status(ppa, &srd);
      maxlat = maxlat.max(sublat);
    }
    maxlat
  }

  /// Write path. Drains forced GC first while free lines are critically
  /// low, then allocates page by page from the data stream.
  /// 写路径。空闲 line 降到红线以下时先做强制回收，再逐页从数据流
  /// 分配。
  pub fn write(&mut self, lba: u64, nlb: u32, stime: u64) -> u64 {
    let Some((start_lpn, end_lpn)) = self.lpn_range(lba, nlb) else {
      return 0;
    };

    while self.should_gc_high() {
      if !self.do_gc(true) {
        break;
      }
    }

    let mut maxlat = 0;
    for lpn in start_lpn..=end_lpn {
      self.stat.access_cnt += 1;
      let entry_idx = match self.cm.hit(lpn) {
        Some(idx) => {
          self.stat.cmt_hit_cnt += 1;
          idx
        }
        None => {
          self.stat.cmt_miss_cnt += 1;
          self.process_translation_page_write(lpn, stime)
        }
      };

      let old_ppa = self.get_maptbl_ent(lpn);
      if old_ppa.is_mapped() {
        // retire the previous copy first
        self.mark_page_invalid(old_ppa);
        self.set_rmap_ent(INVALID_LPN, old_ppa);
      }

      let new_ppa = self.get_new_page();
      self.set_maptbl_ent(lpn, new_ppa);
      let ppn = self.sp.ppa2pgidx(new_ppa);
      {
        let e = self.cm.entry_mut(entry_idx);
        e.ppn = ppn;
        e.dirty = true;
      }
      self.set_rmap_ent(lpn, new_ppa);
      self.mark_page_valid(new_ppa);
      self.advance_write_pointer();

      let swr = NandCmd {
        io: IoKind::User,
        op: NandOp::Write,
        stime,
      };
      let curlat = self.advance_status(new_ppa, &swr);
      maxlat = maxlat.max(curlat);
    }
    maxlat
  }

  /// Full sweep over the bookkeeping cross-checks. Test helper; cost grows
  /// with the page count.
  /// 对账本做全量交叉校验。测试辅助；开销随页数增长。
  pub fn assert_consistent(&self) {
    let spp = &self.sp;

    // per-block page statuses vs counters
    for ch in 0..spp.nchs {
      for lun in 0..spp.luns_per_ch {
        for pl in 0..spp.pls_per_lun {
          for blk in 0..spp.blks_per_pl {
            let b = &self.ch[ch].lun[lun].pl[pl].blk[blk];
            let valid = b.pg.iter().filter(|p| p.status == PgStatus::Valid).count();
            let invalid = b
              .pg
              .iter()
              .filter(|p| p.status == PgStatus::Invalid)
              .count();
            assert_eq!(b.vpc, valid, "block vpc drift at ch{ch} lun{lun} blk{blk}");
            assert_eq!(b.ipc, invalid, "block ipc drift at ch{ch} lun{lun} blk{blk}");
            assert!(b.vpc + b.ipc <= spp.pgs_per_blk);
          }
        }
      }
    }

    // per-line counters vs the blocks they span
    for line in self.lm.lines.iter() {
      assert!(line.vpc + line.ipc <= spp.pgs_per_line);
      let mut vpc = 0;
      let mut ipc = 0;
      for ch in 0..spp.nchs {
        for lun in 0..spp.luns_per_ch {
          let b = &self.ch[ch].lun[lun].pl[0].blk[line.id];
          vpc += b.vpc;
          ipc += b.ipc;
        }
      }
      assert_eq!(line.vpc, vpc, "line vpc drift at line {}", line.id);
      assert_eq!(line.ipc, ipc, "line ipc drift at line {}", line.id);
    }

    // the two open lines belong to no set
    assert_eq!(
      self.lm.free_line_cnt + self.lm.victim_line_cnt + self.lm.full_line_cnt + 2,
      self.lm.tt_lines,
      "line sets do not partition the pool"
    );
    assert_eq!(self.lm.free_ids().len(), self.lm.free_line_cnt);
    assert_eq!(self.lm.full_ids().len(), self.lm.full_line_cnt);
    assert_eq!(self.lm.victim_ids().len(), self.lm.victim_line_cnt);
    for id in self.lm.free_ids() {
      assert_eq!(self.lm.lines[id].kind, LineKind::None);
    }

    // forward map and reverse map agree
    for lpn in 0..spp.tt_pgs as u64 {
      let ppa = self.maptbl[lpn as usize];
      if ppa.is_mapped() {
        assert!(spp.valid_ppa(ppa));
        assert_eq!(
          self.rmap[spp.ppa2pgidx(ppa) as usize],
          lpn,
          "rmap does not point back at lpn {lpn}"
        );
      }
    }

    // cmt lists and hash table agree on membership
    assert_eq!(self.cm.used_cnt + self.cm.free_cnt, self.cm.tt_entries);
    assert_eq!(self.cm.lru_count(), self.cm.used_cnt);
    assert_eq!(self.cm.hash_count(), self.cm.used_cnt);

    // victim heap: ordered, positions in sync, top is minimal
    let victims = self.lm.victim_ids();
    for (i, &id) in victims.iter().enumerate() {
      let slot = i + 1;
      assert_eq!(self.lm.lines[id as usize].pos, slot, "heap pos drift");
      if slot > 1 {
        let parent = victims[slot / 2 - 1] as usize;
        assert!(
          self.lm.lines[parent].vpc <= self.lm.lines[id as usize].vpc,
          "heap order broken at slot {slot}"
        );
      }
      assert!(self.lm.lines[id as usize].ipc > 0);
    }
  }
}
