use log::error;

use crate::ssd::map::INVALID_LPN;

/// Bucket count of the CMT hash table. Power of two so lookups mask
/// instead of dividing.
/// CMT 哈希表桶数。取二的幂，查找时用掩码代替取模。
pub const CMT_HASH_SIZE: usize = 4096;

/// Flat-PPN value carried by an entry whose LPN has no on-flash page.
/// LPN 尚无闪存页时条目携带的扁平 PPN 取值。
pub const UNMAPPED_PPN: u64 = u64::MAX;

const NIL: u32 = u32::MAX;

/// One cached LPN to PPN mapping. An entry sits either on the free list or
/// on the LRU list; on the LRU list it is also chained from its hash bucket.
/// 一条缓存的 LPN 到 PPN 映射。条目要么在空闲链上，要么在 LRU 链上；
/// 在 LRU 链上时还挂在对应的哈希桶链中。
pub struct CmtEntry {
  pub lpn: u64,
  pub ppn: u64,
  /// Set when the cached mapping differs from the on-flash translation page.
  /// 缓存映射与闪存上翻译页不一致时置位。
  pub dirty: bool,
  prev: u32,
  next: u32,
  hnext: u32,
}

/// Cached Mapping Table: a bounded pool of entries with an index-linked LRU
/// list, an index-linked free list, and a chained hash table over the LPNs.
/// 缓存映射表：有界条目池，带索引链接的 LRU 链、空闲链和按 LPN 组织的
/// 链式哈希表。
pub struct Cmt {
  pub entries: Vec<CmtEntry>,
  pub tt_entries: usize,
  pub free_cnt: usize,
  pub used_cnt: usize,
  free_head: u32,
  free_tail: u32,
  lru_head: u32,
  lru_tail: u32,
  ht: Box<[u32]>,
}

#[inline(always)]
fn bucket(lpn: u64) -> usize {
  (lpn as usize) & (CMT_HASH_SIZE - 1)
}

impl Cmt {
  pub fn new(tt_entries: usize) -> Self {
    let entries = (0..tt_entries)
      .map(|_| CmtEntry {
        lpn: INVALID_LPN,
        ppn: UNMAPPED_PPN,
        dirty: false,
        prev: NIL,
        next: NIL,
        hnext: NIL,
      })
      .collect();
    let mut cm = Cmt {
      entries,
      tt_entries,
      free_cnt: 0,
      used_cnt: 0,
      free_head: NIL,
      free_tail: NIL,
      lru_head: NIL,
      lru_tail: NIL,
      ht: vec![NIL; CMT_HASH_SIZE].into_boxed_slice(),
    };
    for i in 0..tt_entries as u32 {
      cm.free_push_tail(i);
    }
    debug_assert_eq!(cm.free_cnt, cm.tt_entries);
    cm
  }

  #[inline(always)]
  pub fn entry(&self, idx: u32) -> &CmtEntry {
    &self.entries[idx as usize]
  }

  #[inline(always)]
  pub fn entry_mut(&mut self, idx: u32) -> &mut CmtEntry {
    &mut self.entries[idx as usize]
  }

  /// Hash lookup without touching recency.
  /// 仅做哈希查找，不影响热度。
  pub fn find(&self, lpn: u64) -> Option<u32> {
    let mut cur = self.ht[bucket(lpn)];
    while cur != NIL {
      let e = &self.entries[cur as usize];
      if e.lpn == lpn {
        return Some(cur);
      }
      cur = e.hnext;
    }
    None
  }

  /// Lookup that refreshes the entry to the LRU head on success.
  /// 命中时把条目移到 LRU 头部的查找。
  pub fn hit(&mut self, lpn: u64) -> Option<u32> {
    let idx = self.find(lpn)?;
    self.lru_unlink(idx);
    self.lru_push_head(idx);
    Some(idx)
  }

  /// Take a free entry for (lpn, ppn), clean, at the LRU head.
  /// A free entry must be available.
  /// 从空闲链取一个条目记录 (lpn, ppn)，状态为干净，置于 LRU 头部。
  /// 必须有空闲条目可用。
  pub fn insert(&mut self, lpn: u64, ppn: u64) -> u32 {
    let idx = match self.free_pop_head() {
      Some(i) => i,
      None => {
        error!("no cmt entry in the free entry list");
        panic!("cmt free entry list exhausted");
      }
    };
    {
      let e = &mut self.entries[idx as usize];
      e.lpn = lpn;
      e.ppn = ppn;
      e.dirty = false;
      e.hnext = NIL;
    }
    self.lru_push_head(idx);
    self.used_cnt += 1;
    let b = bucket(lpn);
    self.entries[idx as usize].hnext = self.ht[b];
    self.ht[b] = idx;
    idx
  }

  /// Unlink the coldest entry from the LRU list and hand it to the caller.
  /// The caller finishes the eviction with [`Self::release`] once any
  /// write-back is done.
  /// 把最冷的条目从 LRU 链摘下交给调用方。调用方完成可能的回写后再用
  /// [`Self::release`] 结束驱逐。
  pub fn detach_lru(&mut self) -> u32 {
    let tail = self.lru_tail;
    assert!(tail != NIL, "lru list empty on eviction");
    self.lru_unlink(tail);
    tail
  }

  /// Drop a detached entry from the hash table and return it to the free
  /// pool.
  /// 把已摘下的条目从哈希表删除并归还空闲池。
  pub fn release(&mut self, idx: u32) {
    if !self.hash_remove(idx) {
      error!("released entry was not in the hash table");
    }
    {
      let e = &mut self.entries[idx as usize];
      e.dirty = false;
      e.lpn = INVALID_LPN;
      e.ppn = UNMAPPED_PPN;
    }
    self.free_push_tail(idx);
    self.used_cnt -= 1;
  }

  fn free_push_tail(&mut self, idx: u32) {
    {
      let e = &mut self.entries[idx as usize];
      e.prev = self.free_tail;
      e.next = NIL;
    }
    if self.free_tail != NIL {
      self.entries[self.free_tail as usize].next = idx;
    } else {
      self.free_head = idx;
    }
    self.free_tail = idx;
    self.free_cnt += 1;
  }

  fn free_pop_head(&mut self) -> Option<u32> {
    let head = self.free_head;
    if head == NIL {
      return None;
    }
    let next = self.entries[head as usize].next;
    self.free_head = next;
    if next != NIL {
      self.entries[next as usize].prev = NIL;
    } else {
      self.free_tail = NIL;
    }
    let e = &mut self.entries[head as usize];
    e.prev = NIL;
    e.next = NIL;
    self.free_cnt -= 1;
    Some(head)
  }

  fn lru_push_head(&mut self, idx: u32) {
    {
      let e = &mut self.entries[idx as usize];
      e.prev = NIL;
      e.next = self.lru_head;
    }
    if self.lru_head != NIL {
      self.entries[self.lru_head as usize].prev = idx;
    } else {
      self.lru_tail = idx;
    }
    self.lru_head = idx;
  }

  fn lru_unlink(&mut self, idx: u32) {
    let (prev, next) = {
      let e = &self.entries[idx as usize];
      (e.prev, e.next)
    };
    if prev != NIL {
      self.entries[prev as usize].next = next;
    } else {
      self.lru_head = next;
    }
    if next != NIL {
      self.entries[next as usize].prev = prev;
    } else {
      self.lru_tail = prev;
    }
    let e = &mut self.entries[idx as usize];
    e.prev = NIL;
    e.next = NIL;
  }

  fn hash_remove(&mut self, idx: u32) -> bool {
    let b = bucket(self.entries[idx as usize].lpn);
    let mut cur = self.ht[b];
    if cur == idx {
      self.ht[b] = self.entries[idx as usize].hnext;
      self.entries[idx as usize].hnext = NIL;
      return true;
    }
    while cur != NIL {
      let next = self.entries[cur as usize].hnext;
      if next == idx {
        self.entries[cur as usize].hnext = self.entries[idx as usize].hnext;
        self.entries[idx as usize].hnext = NIL;
        return true;
      }
      cur = next;
    }
    false
  }

  /// LRU order, hot to cold. Debug helper.
  /// LRU 顺序，从热到冷。调试辅助。
  pub fn lru_ids(&self) -> Vec<u32> {
    let mut out = Vec::with_capacity(self.used_cnt);
    let mut cur = self.lru_head;
    while cur != NIL {
      out.push(cur);
      cur = self.entries[cur as usize].next;
    }
    out
  }

  pub fn lru_count(&self) -> usize {
    self.lru_ids().len()
  }

  pub fn hash_count(&self) -> usize {
    let mut n = 0;
    for b in 0..CMT_HASH_SIZE {
      let mut cur = self.ht[b];
      while cur != NIL {
        n += 1;
        cur = self.entries[cur as usize].hnext;
      }
    }
    n
  }
}
