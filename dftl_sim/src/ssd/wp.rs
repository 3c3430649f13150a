use log::error;

use crate::{
  conf::SsdConf,
  ssd::{
    Ssd,
    addr::Ppa,
    line::{LineKind, LineMgr},
  },
};

/// Stripe cursor of one allocation stream.
/// 单条分配流的条带游标。
#[derive(Debug, Clone)]
pub struct WritePointer {
  pub curline: usize,
  pub ch: usize,
  pub lun: usize,
  pub pg: usize,
  pub blk: usize,
  pub pl: usize,
}

impl WritePointer {
  pub fn new(line: usize) -> Self {
    WritePointer {
      curline: line,
      ch: 0,
      lun: 0,
      pg: 0,
      blk: line,
      pl: 0,
    }
  }
}

/// Step the cursor channel-first, then LUN, then page. When the page index
/// wraps, the finished line moves to the full set or the victim heap and a
/// fresh free line is adopted for the stream.
/// 游标先走通道，再走 LUN，再走页号。页号回绕时，写完的 line 进入写满
/// 集合或待回收堆，并为该流领取一条新的空闲 line。
fn advance(wp: &mut WritePointer, lm: &mut LineMgr, spp: &SsdConf, kind: LineKind) {
  debug_assert!(wp.ch < spp.nchs);
  wp.ch += 1;
  if wp.ch != spp.nchs {
    return;
  }
  wp.ch = 0;
  debug_assert!(wp.lun < spp.luns_per_ch);
  wp.lun += 1;
  if wp.lun != spp.luns_per_ch {
    return;
  }
  wp.lun = 0;
  debug_assert!(wp.pg < spp.pgs_per_blk);
  wp.pg += 1;
  if wp.pg != spp.pgs_per_blk {
    return;
  }
  wp.pg = 0;

  let cur = wp.curline;
  if lm.lines[cur].vpc == spp.pgs_per_line {
    // every page still valid, park it on the full list
    debug_assert_eq!(lm.lines[cur].ipc, 0);
    lm.push_full(cur);
  } else {
    debug_assert!(lm.lines[cur].vpc < spp.pgs_per_line);
    // something got over-written while the line was open
    debug_assert!(lm.lines[cur].ipc > 0);
    lm.pq_insert(cur);
  }

  debug_assert!(wp.blk < spp.blks_per_pl);
  let Some(next) = lm.pop_free() else {
    error!("no free lines left");
    panic!("free line pool exhausted");
  };
  lm.lines[next].kind = kind;
  wp.curline = next;
  wp.blk = next;
  debug_assert!(wp.blk < spp.blks_per_pl);
  debug_assert_eq!(wp.pg, 0);
  debug_assert_eq!(wp.lun, 0);
  debug_assert_eq!(wp.ch, 0);
  debug_assert_eq!(wp.pl, 0);
}

impl Ssd {
  /// Next page the data stream will program.
  /// 数据流将要编程的下一页。
  #[inline(always)]
  pub fn get_new_page(&self) -> Ppa {
    let wp = &self.wp;
    debug_assert_eq!(wp.pl, 0);
    Ppa::new(wp.ch, wp.lun, wp.pl, wp.blk, wp.pg)
  }

  /// Next page the translation stream will program.
  /// 翻译流将要编程的下一页。
  #[inline(always)]
  pub fn get_new_trans_page(&self) -> Ppa {
    let wp = &self.twp;
    debug_assert_eq!(wp.pl, 0);
    Ppa::new(wp.ch, wp.lun, wp.pl, wp.blk, wp.pg)
  }

  pub fn advance_write_pointer(&mut self) {
    advance(&mut self.wp, &mut self.lm, &self.sp, LineKind::Data);
  }

  pub fn advance_trans_write_pointer(&mut self) {
    advance(&mut self.twp, &mut self.lm, &self.sp, LineKind::Trans);
  }
}
