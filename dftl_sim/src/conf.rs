/// NAND page read latency in nanoseconds.
/// NAND 页读取延迟（纳秒）。
pub const NAND_READ_LATENCY: u64 = 40_000;
/// NAND page program latency in nanoseconds.
/// NAND 页编程延迟（纳秒）。
pub const NAND_PROG_LATENCY: u64 = 200_000;
/// NAND block erase latency in nanoseconds.
/// NAND 块擦除延迟（纳秒）。
pub const NAND_ERASE_LATENCY: u64 = 2_000_000;

/// Device geometry and timing parameters, with every derived count
/// precomputed at construction time.
/// 设备几何与时序参数，所有派生计数在构造时预先算好。
#[derive(Debug, Clone)]
pub struct SsdConf {
  pub secsz: usize,
  pub secs_per_pg: usize,
  pub pgs_per_blk: usize,
  pub blks_per_pl: usize,
  pub pls_per_lun: usize,
  pub luns_per_ch: usize,
  pub nchs: usize,

  pub pg_rd_lat: u64,
  pub pg_wr_lat: u64,
  pub blk_er_lat: u64,
  /// Channel transfer cost. Zero keeps the transfer stage idle.
  /// 通道传输开销。为零时传输阶段不生效。
  pub ch_xfer_lat: u64,

  pub secs_per_blk: usize,
  pub secs_per_pl: usize,
  pub secs_per_lun: usize,
  pub secs_per_ch: usize,
  pub tt_secs: usize,

  pub pgs_per_pl: usize,
  pub pgs_per_lun: usize,
  pub pgs_per_ch: usize,
  pub tt_pgs: usize,

  pub blks_per_lun: usize,
  pub blks_per_ch: usize,
  pub tt_blks: usize,

  pub pls_per_ch: usize,
  pub tt_pls: usize,
  pub tt_luns: usize,

  pub blks_per_line: usize,
  pub pgs_per_line: usize,
  pub secs_per_line: usize,
  pub tt_lines: usize,

  pub gc_thres_pcent: f64,
  pub gc_thres_lines: usize,
  pub gc_thres_pcent_high: f64,
  pub gc_thres_lines_high: usize,
  pub enable_gc_delay: bool,

  /// LPN mappings carried by one translation page.
  /// 单个翻译页承载的 LPN 映射数。
  pub ents_per_pg: usize,
  pub tt_gtd_size: usize,
  pub tt_cmt_size: usize,
}

impl SsdConf {
  /// Stock 16 GiB device: 8 channels, 8 LUNs each, 256 blocks of 256 pages.
  /// 默认 16 GiB 设备：8 通道，每通道 8 个 LUN，256 个块，每块 256 页。
  pub fn new() -> Self {
    Self::with_geometry(8, 8, 256, 256)
  }

  /// Same derivation rules over an alternate geometry. One plane per LUN.
  /// 在其它几何结构上按同样规则派生。每个 LUN 一个平面。
  pub fn with_geometry(
    nchs: usize,
    luns_per_ch: usize,
    blks_per_pl: usize,
    pgs_per_blk: usize,
  ) -> Self {
    let secsz = 512;
    let secs_per_pg = 8;
    let pls_per_lun = 1;

    let secs_per_blk = secs_per_pg * pgs_per_blk;
    let secs_per_pl = secs_per_blk * blks_per_pl;
    let secs_per_lun = secs_per_pl * pls_per_lun;
    let secs_per_ch = secs_per_lun * luns_per_ch;
    let tt_secs = secs_per_ch * nchs;

    let pgs_per_pl = pgs_per_blk * blks_per_pl;
    let pgs_per_lun = pgs_per_pl * pls_per_lun;
    let pgs_per_ch = pgs_per_lun * luns_per_ch;
    let tt_pgs = pgs_per_ch * nchs;

    let blks_per_lun = blks_per_pl * pls_per_lun;
    let blks_per_ch = blks_per_lun * luns_per_ch;
    let tt_blks = blks_per_ch * nchs;

    let pls_per_ch = pls_per_lun * luns_per_ch;
    let tt_pls = pls_per_ch * nchs;

    let tt_luns = luns_per_ch * nchs;

    // a line spans the same block index on every LUN
    let blks_per_line = tt_luns;
    let pgs_per_line = blks_per_line * pgs_per_blk;
    let secs_per_line = pgs_per_line * secs_per_pg;
    let tt_lines = blks_per_lun;

    let gc_thres_pcent = 0.75;
    let gc_thres_lines = ((1.0 - gc_thres_pcent) * tt_lines as f64) as usize;
    let gc_thres_pcent_high = 0.95;
    let gc_thres_lines_high = ((1.0 - gc_thres_pcent_high) * tt_lines as f64) as usize;

    let ents_per_pg = 512;
    let tt_gtd_size = tt_pgs.div_ceil(ents_per_pg);
    let tt_cmt_size = tt_blks / 2;

    Self {
      secsz,
      secs_per_pg,
      pgs_per_blk,
      blks_per_pl,
      pls_per_lun,
      luns_per_ch,
      nchs,
      pg_rd_lat: NAND_READ_LATENCY,
      pg_wr_lat: NAND_PROG_LATENCY,
      blk_er_lat: NAND_ERASE_LATENCY,
      ch_xfer_lat: 0,
      secs_per_blk,
      secs_per_pl,
      secs_per_lun,
      secs_per_ch,
      tt_secs,
      pgs_per_pl,
      pgs_per_lun,
      pgs_per_ch,
      tt_pgs,
      blks_per_lun,
      blks_per_ch,
      tt_blks,
      pls_per_ch,
      tt_pls,
      tt_luns,
      blks_per_line,
      pgs_per_line,
      secs_per_line,
      tt_lines,
      gc_thres_pcent,
      gc_thres_lines,
      gc_thres_pcent_high,
      gc_thres_lines_high,
      enable_gc_delay: true,
      ents_per_pg,
      tt_gtd_size,
      tt_cmt_size,
    }
  }
}

impl Default for SsdConf {
  fn default() -> Self {
    Self::new()
  }
}
