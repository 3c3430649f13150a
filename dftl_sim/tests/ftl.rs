use dftl_sim::{
  Ssd, SsdConf,
  conf::{NAND_PROG_LATENCY, NAND_READ_LATENCY},
  ssd::{Ppa, UNMAPPED_PPN},
};

fn small() -> SsdConf {
  SsdConf::with_geometry(2, 2, 32, 8)
}

#[test]
fn test_conf_derived() {
  let spp = SsdConf::new();
  assert_eq!(spp.tt_pgs, 4_194_304);
  assert_eq!(spp.tt_secs * spp.secsz, 16 << 30);
  assert_eq!(spp.tt_lines, 256);
  assert_eq!(spp.pgs_per_line, 16384);
  assert_eq!(spp.blks_per_line, 64);
  assert_eq!(spp.gc_thres_lines, 64);
  assert_eq!(spp.gc_thres_lines_high, 12);
  assert_eq!(spp.tt_gtd_size, 8192);
  assert_eq!(spp.tt_cmt_size, 8192);

  let spp = small();
  assert_eq!(spp.tt_pgs, 1024);
  assert_eq!(spp.tt_lines, 32);
  assert_eq!(spp.pgs_per_line, 32);
  assert_eq!(spp.tt_cmt_size, 64);
  assert_eq!(spp.tt_gtd_size, 2);
  assert_eq!(spp.gc_thres_lines, 8);
  assert_eq!(spp.gc_thres_lines_high, 1);
}

#[test]
fn test_ppa_pgidx_bijection() {
  let spp = small();
  let mut seen = vec![false; spp.tt_pgs];
  for ch in 0..spp.nchs {
    for lun in 0..spp.luns_per_ch {
      for blk in 0..spp.blks_per_pl {
        for pg in 0..spp.pgs_per_blk {
          let ppa = Ppa::new(ch, lun, 0, blk, pg);
          assert!(spp.valid_ppa(ppa));
          let idx = spp.ppa2pgidx(ppa) as usize;
          assert!(idx < spp.tt_pgs);
          assert!(!seen[idx], "page index {idx} produced twice");
          seen[idx] = true;
          assert_eq!(spp.pgidx2ppa(idx as u64), ppa);
        }
      }
    }
  }
  assert!(seen.iter().all(|&s| s));
  assert!(!Ppa::UNMAPPED.is_mapped());
}

#[test]
fn test_empty_device_read() {
  let mut ssd = Ssd::new(SsdConf::new());
  let tt_lines = ssd.sp.tt_lines;

  let lat = ssd.read(0, 8, 1_000_000);
  assert_eq!(lat, 0);
  assert_eq!(ssd.stat.access_cnt, 1);
  assert_eq!(ssd.stat.cmt_miss_cnt, 1);
  assert_eq!(ssd.stat.cmt_hit_cnt, 0);

  // the hole gets cached so the next lookup hits
  assert_eq!(ssd.cm.used_cnt, 1);
  let idx = ssd.cm.find(0).expect("lpn 0 cached");
  assert!(!ssd.cm.entry(idx).dirty);
  assert_eq!(ssd.cm.entry(idx).ppn, UNMAPPED_PPN);

  // no line state moved
  assert_eq!(ssd.lm.free_line_cnt, tt_lines - 2);
  assert_eq!(ssd.lm.victim_line_cnt, 0);
  assert_eq!(ssd.lm.full_line_cnt, 0);
  assert_eq!(ssd.lm.lines[ssd.wp.curline].vpc, 0);

  let lat = ssd.read(0, 8, 2_000_000);
  assert_eq!(lat, 0);
  assert_eq!(ssd.stat.cmt_hit_cnt, 1);

  ssd.assert_consistent();
}

#[test]
fn test_single_write_then_read() {
  let mut ssd = Ssd::new(small());
  let t_write = 1_000_000_000;
  let t_read = 2_000_000_000;

  let wlat = ssd.write(0, 8, t_write);
  assert_eq!(wlat, NAND_PROG_LATENCY);

  let ppa = ssd.get_maptbl_ent(0);
  assert!(ppa.is_mapped());
  assert_eq!(ssd.get_rmap_ent(ppa), 0);
  assert_eq!(ssd.lm.lines[ssd.wp.curline].vpc, 1);

  let rlat = ssd.read(0, 8, t_read);
  assert_eq!(rlat, NAND_READ_LATENCY);
  assert_eq!(ssd.stat.cmt_hit_cnt, 1);
  assert_eq!(ssd.stat.cmt_miss_cnt, 1);
  // the read landed on the LUN the write programmed
  assert_eq!(
    ssd.get_lun(ppa).next_lun_avail_time,
    t_read + NAND_READ_LATENCY
  );

  ssd.assert_consistent();
}

#[test]
fn test_mark_valid_then_invalid_restores_counters() {
  let mut ssd = Ssd::new(small());
  let ppa = ssd.get_new_page();
  let line = ppa.blk();

  assert_eq!(ssd.get_blk(ppa).vpc, 0);
  assert_eq!(ssd.get_blk(ppa).ipc, 0);

  ssd.mark_page_valid(ppa);
  assert_eq!(ssd.get_blk(ppa).vpc, 1);
  assert_eq!(ssd.lm.lines[line].vpc, 1);

  ssd.mark_page_invalid(ppa);
  assert_eq!(ssd.get_blk(ppa).vpc, 0);
  assert_eq!(ssd.get_blk(ppa).ipc, 1);
  assert_eq!(ssd.lm.lines[line].vpc, 0);
  assert_eq!(ssd.lm.lines[line].ipc, 1);
}

#[test]
fn test_cmt_eviction_writes_translation_pages() {
  let mut ssd = Ssd::new(small());
  let secs = ssd.sp.secs_per_pg as u64;
  let cap = ssd.sp.tt_cmt_size as u64;
  let trans_line = ssd.twp.curline;
  let mut t = 1_000_000;

  // one more distinct lpn than the cache holds
  for lpn in 0..=cap {
    ssd.write(lpn * secs, 8, t);
    t += 1_000_000;
  }

  // the lru tail (lpn 0) went out dirty; its tvpn had no on-flash page
  // yet, so the write-back is a bare program of a fresh translation page
  assert_eq!(ssd.cm.used_cnt, cap as usize);
  assert!(ssd.cm.find(0).is_none());
  assert_eq!(ssd.stat.trans_wr_cnt, 1);
  assert_eq!(ssd.stat.trans_rd_cnt, 0);
  assert!(ssd.get_gtd_ent(0).is_mapped());
  assert_eq!(ssd.lm.lines[trans_line].vpc, 1);
  assert_eq!(ssd.lm.lines[trans_line].ipc, 0);

  // next eviction sees a mapped tvpn: read the old page, program a new one
  ssd.write((cap + 1) * secs, 8, t);
  assert_eq!(ssd.cm.used_cnt, cap as usize);
  assert!(ssd.cm.find(1).is_none());
  assert_eq!(ssd.stat.trans_wr_cnt, 2);
  // one read demand-loading lpn cap+1, one read refreshing the victim page
  assert_eq!(ssd.stat.trans_rd_cnt, 2);
  assert_eq!(ssd.lm.lines[trans_line].vpc, 1);
  assert_eq!(ssd.lm.lines[trans_line].ipc, 1);

  ssd.assert_consistent();
}

#[test]
fn test_full_line_turns_victim_on_overwrite() {
  let mut ssd = Ssd::new(small());
  let secs = ssd.sp.secs_per_pg as u64;
  let pgs_per_line = ssd.sp.pgs_per_line as u64;
  let first_line = ssd.wp.curline;
  let mut t = 1_000_000;

  for lpn in 0..pgs_per_line {
    ssd.write(lpn * secs, 8, t);
    t += 1_000_000;
  }
  assert_eq!(ssd.lm.full_line_cnt, 1);
  assert_eq!(ssd.lm.full_ids(), vec![first_line]);
  assert_eq!(ssd.lm.lines[first_line].vpc, pgs_per_line as usize);
  assert_ne!(ssd.wp.curline, first_line);

  ssd.write(0, 8, t);
  assert_eq!(ssd.lm.full_line_cnt, 0);
  assert_eq!(ssd.lm.victim_line_cnt, 1);
  let top = ssd.lm.pq_peek().expect("victim queued");
  assert_eq!(top, first_line);
  assert_eq!(ssd.lm.lines[first_line].vpc, pgs_per_line as usize - 1);
  assert_eq!(ssd.lm.lines[first_line].ipc, 1);
  assert_eq!(ssd.lm.lines[first_line].pos, 1);

  ssd.assert_consistent();
}
