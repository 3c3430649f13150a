/// Access and flash-op counters kept alongside the FTL state.
/// 与 FTL 状态一同维护的访问与闪存操作计数。
#[derive(Debug, Clone, Default)]
pub struct Statistics {
  pub access_cnt: u64,
  pub cmt_hit_cnt: u64,
  pub cmt_miss_cnt: u64,
  /// Translation-page reads charged to the flash model.
  /// 计入闪存模型的翻译页读取次数。
  pub trans_rd_cnt: u64,
  /// Translation-page writes charged to the flash model.
  /// 计入闪存模型的翻译页写入次数。
  pub trans_wr_cnt: u64,
  pub gc_rd_cnt: u64,
  pub gc_wr_cnt: u64,
  pub blk_er_cnt: u64,
}

impl Statistics {
  pub fn cmt_hit_ratio(&self) -> f64 {
    if self.access_cnt == 0 {
      0.0
    } else {
      self.cmt_hit_cnt as f64 / self.access_cnt as f64
    }
  }
}
