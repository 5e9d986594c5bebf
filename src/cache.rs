use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::SystemTime;

use bytes::Bytes;
use log::warn;
use lru::LruCache;

#[derive(Clone)]
struct CacheEntry {
    content: Bytes,
    modified_time: SystemTime,
}

/// 静态文件的 LRU 缓存，按修改时间校验有效性。
///
/// 整个缓存由一把互斥锁保护，可以在多个请求之间直接共享。
pub struct FileCache {
    cache: Mutex<LruCache<String, CacheEntry>>,
}

impl FileCache {
    /// 根据容量构造，容量为 0 时按 1 处理
    pub fn from_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, CacheEntry>> {
        match self.cache.lock() {
            Ok(lock) => lock,
            Err(poisoned) => {
                warn!("缓存锁被污染，恢复并继续");
                poisoned.into_inner()
            }
        }
    }

    // 放入
    pub fn push(&self, filename: &str, bytes: Bytes, modified_time: SystemTime) {
        let entry = CacheEntry {
            content: bytes,
            modified_time,
        };
        self.lock().put(filename.to_string(), entry);
    }

    // 查询有效缓存，修改时间不一致视为失效
    pub fn find(&self, filename: &str, current_modified_time: SystemTime) -> Option<Bytes> {
        let mut cache = self.lock();
        match cache.get(filename) {
            Some(entry) if entry.modified_time == current_modified_time => Some(entry.content.clone()),
            _ => None,
        }
    }

    /// 文件大小是否适合缓存
    pub fn should_cache(file_size: u64, threshold: u64) -> bool {
        file_size <= threshold
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, SystemTime};

    #[test]
    fn test_cache_creation() {
        let cache = FileCache::from_capacity(10);
        assert_eq!(cache.capacity(), 10);
        assert!(cache.is_empty());
        assert_eq!(FileCache::from_capacity(0).capacity(), 1);
    }

    #[test]
    fn test_cache_push_and_find() {
        let cache = FileCache::from_capacity(3);
        let time = SystemTime::now();
        let content = Bytes::from("test content");

        cache.push("file1.txt", content.clone(), time);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.find("file1.txt", time), Some(content));
        assert!(cache.find("nonexistent.txt", time).is_none());
    }

    #[test]
    fn test_cache_modified_time_invalidation() {
        let cache = FileCache::from_capacity(3);
        let time1 = SystemTime::now();
        let time2 = time1 + Duration::from_secs(10);

        cache.push("file1.txt", Bytes::from("test content"), time1);

        assert!(cache.find("file1.txt", time2).is_none());
        assert!(cache.find("file1.txt", time1).is_some());
    }

    #[test]
    fn test_cache_lru_eviction() {
        let cache = FileCache::from_capacity(2);
        let time = SystemTime::now();

        cache.push("file1.txt", Bytes::from("content1"), time);
        cache.push("file2.txt", Bytes::from("content2"), time);
        cache.find("file1.txt", time);
        cache.push("file3.txt", Bytes::from("content3"), time);

        assert_eq!(cache.len(), 2);
        assert!(cache.find("file2.txt", time).is_none());
        assert!(cache.find("file1.txt", time).is_some());
        assert!(cache.find("file3.txt", time).is_some());
    }

    #[test]
    fn test_should_cache_threshold() {
        assert!(FileCache::should_cache(10, 10));
        assert!(!FileCache::should_cache(11, 10));
    }
}
