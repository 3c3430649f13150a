use log::{debug, error, warn};
use rapidhash::RapidHashSet;

use crate::ssd::{
  Ssd,
  addr::Ppa,
  line::LineKind,
  nand::{IoKind, NandCmd, NandOp, PgStatus},
};

impl Ssd {
  fn gc_read_page(&mut self, ppa: Ppa) {
    // advance ssd status, we don't care about how long it takes
    if self.sp.enable_gc_delay {
      let gcr = NandCmd {
        io: IoKind::Gc,
        op: NandOp::Read,
        stime: 0,
      };
      self.advance_status(ppa, &gcr);
    }
    self.stat.gc_rd_cnt += 1;
  }

  /// Move one valid data page to a fresh slot on the data stream.
  /// 将一个有效数据页搬到数据流的新槽位。
  fn gc_write_page(&mut self, old_ppa: Ppa) {
    let lpn = self.get_rmap_ent(old_ppa);
    debug_assert!(self.sp.valid_lpn(lpn));
    let new_ppa = self.get_new_page();
    self.set_maptbl_ent(lpn, new_ppa);
    self.set_rmap_ent(lpn, new_ppa);
    self.mark_page_valid(new_ppa);
    self.advance_write_pointer();
    if self.sp.enable_gc_delay {
      let gcw = NandCmd {
        io: IoKind::Gc,
        op: NandOp::Write,
        stime: 0,
      };
      self.advance_status(new_ppa, &gcw);
    }
    self.stat.gc_wr_cnt += 1;
    let lun = self.get_lun_mut(new_ppa);
    lun.gc_endtime = lun.next_lun_avail_time;
  }

  /// Move one valid translation page to a fresh slot on the translation
  /// stream. The old page is left for the block erase to sweep up.
  /// 将一个有效翻译页搬到翻译流的新槽位。旧页留给块擦除统一清理。
  fn gc_translation_page_write(&mut self, old_ppa: Ppa) {
    let tvpn = self.get_rmap_ent(old_ppa);
    debug_assert!((tvpn as usize) < self.sp.tt_gtd_size);
    let new_ppa = self.get_new_trans_page();
    self.set_gtd_ent(tvpn, new_ppa);
    self.set_rmap_ent(tvpn, new_ppa);
    self.mark_page_valid(new_ppa);
    self.advance_trans_write_pointer();
    if self.sp.enable_gc_delay {
      let gcw = NandCmd {
        io: IoKind::Gc,
        op: NandOp::Write,
        stime: 0,
      };
      self.advance_status(new_ppa, &gcw);
    }
    self.stat.gc_wr_cnt += 1;
    let lun = self.get_lun_mut(new_ppa);
    lun.gc_endtime = lun.next_lun_avail_time;
  }

  /// Pop the best victim, or refuse when reclaiming it would not pay off.
  /// 弹出最优回收对象；收益不足时拒绝。
  pub fn select_victim_line(&mut self, force: bool) -> Option<usize> {
    let top = self.lm.pq_peek()?;
    if !force && self.lm.lines[top].ipc < self.sp.pgs_per_line / 8 {
      return None;
    }
    let id = self.lm.pq_pop()?;
    self.lm.lines[id].pos = 0;
    Some(id)
  }

  /// Copy out every valid page of one data block. Cached mappings are
  /// patched in place and left dirty; uncached ones are persisted through
  /// their translation pages, one read+write per distinct TVPN of this GC
  /// round.
  /// 逐页搬出一个数据块的有效页。已缓存的映射就地更新并置脏；未缓存的
  /// 经翻译页落盘，本轮回收内每个不同 TVPN 只做一次读加写。
  fn clean_one_data_block(&mut self, blk_ppa: Ppa, batch_update: &mut RapidHashSet<u64>) {
    let pgs_per_blk = self.sp.pgs_per_blk;
    let mut cnt = 0;
    let mut ppa = blk_ppa;
    for pg in 0..pgs_per_blk {
      ppa.set_pg(pg);
      // victim blocks are fully programmed, no free pages
      debug_assert!(self.get_pg(ppa).status != PgStatus::Free);
      if self.get_pg(ppa).status != PgStatus::Valid {
        continue;
      }
      cnt += 1;
      self.gc_read_page(ppa);
      let lpn = self.get_rmap_ent(ppa);
      let mapped = self
        .sp
        .valid_lpn(lpn)
        .then(|| self.get_maptbl_ent(lpn))
        .filter(|p| p.is_mapped() && self.sp.valid_ppa(*p));
      let Some(cur) = mapped else {
        warn!("data block contains translation page");
        continue;
      };
      if self.sp.ppa2pgidx(cur) != self.sp.ppa2pgidx(ppa) {
        warn!("data block contains translation page");
        continue;
      }

      self.gc_write_page(ppa);
      if let Some(idx) = self.cm.find(lpn) {
        // the cache will push the move out on eviction
        let new_ppa = self.get_maptbl_ent(lpn);
        let ppn = self.sp.ppa2pgidx(new_ppa);
        let e = self.cm.entry_mut(idx);
        e.ppn = ppn;
        e.dirty = true;
      } else {
        let tvpn = lpn / self.sp.ents_per_pg as u64;
        if batch_update.insert(tvpn) {
          let tppa = self.get_gtd_ent(tvpn);
          self.translation_page_read_no_req(tppa);
          self.translation_page_write(tppa);
        }
      }
    }
    debug_assert_eq!(self.get_blk(ppa).vpc, cnt);
  }

  /// Relocate every valid translation page of one translation block.
  /// 搬移一个翻译块内所有有效的翻译页。
  fn clean_one_trans_block(&mut self, blk_ppa: Ppa) {
    let pgs_per_blk = self.sp.pgs_per_blk;
    let mut cnt = 0;
    let mut ppa = blk_ppa;
    for pg in 0..pgs_per_blk {
      ppa.set_pg(pg);
      debug_assert!(self.get_pg(ppa).status != PgStatus::Free);
      if self.get_pg(ppa).status != PgStatus::Valid {
        continue;
      }
      cnt += 1;
      self.gc_read_page(ppa);
      let tvpn = self.get_rmap_ent(ppa);
      // the directory must point back at this page
      let owned = (tvpn as usize) < self.sp.tt_gtd_size && {
        let cur = self.get_gtd_ent(tvpn);
        cur.is_mapped()
          && self.sp.valid_ppa(cur)
          && self.sp.ppa2pgidx(cur) == self.sp.ppa2pgidx(ppa)
      };
      if owned {
        self.gc_translation_page_write(ppa);
      } else {
        warn!("translation block contains data page");
      }
    }
    debug_assert_eq!(self.get_blk(ppa).vpc, cnt);
  }

  /// One GC round: pick a victim line, clean and erase every block it
  /// spans, then return the line to the free list. Returns false when no
  /// victim qualified.
  /// 一轮回收：选出受害 line，清理并擦除其跨越的每个块，再把 line 送回
  /// 空闲链。无合格对象时返回 false。
  pub fn do_gc(&mut self, force: bool) -> bool {
    let Some(victim) = self.select_victim_line(force) else {
      return false;
    };
    debug!(
      "GC-ing line:{},ipc={},victim={},full={},free={}",
      victim,
      self.lm.lines[victim].ipc,
      self.lm.victim_line_cnt,
      self.lm.full_line_cnt,
      self.lm.free_line_cnt
    );

    let kind = self.lm.lines[victim].kind;
    let mut batch_update: RapidHashSet<u64> = RapidHashSet::default();

    // copy back valid data
    for ch in 0..self.sp.nchs {
      for lun in 0..self.sp.luns_per_ch {
        let ppa = Ppa::new(ch, lun, 0, victim, 0);
        match kind {
          LineKind::Data => self.clean_one_data_block(ppa, &mut batch_update),
          LineKind::Trans => self.clean_one_trans_block(ppa),
          LineKind::None => error!("victim line {victim} belongs to no stream"),
        }
        self.mark_block_free(ppa);
        if self.sp.enable_gc_delay {
          let gce = NandCmd {
            io: IoKind::Gc,
            op: NandOp::Erase,
            stime: 0,
          };
          self.advance_status(ppa, &gce);
        }
        let lunp = self.get_lun_mut(ppa);
        lunp.gc_endtime = lunp.next_lun_avail_time;
      }
    }

    self.mark_line_free(victim);
    true
  }
}
