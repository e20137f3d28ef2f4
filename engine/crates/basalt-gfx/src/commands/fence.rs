//! Fence
//!
//! 单调递增的完成值计数器。队列侧 signal，CPU 或其他队列 wait。
//! 可以 Clone，多持有者共享同一份计数。

use std::sync::{Arc, Condvar, Mutex};

struct GfxFenceInner {
    name: String,
    completed: Mutex<u64>,
    condvar: Condvar,
}

#[derive(Clone)]
pub struct GfxFence {
    inner: Arc<GfxFenceInner>,
}

// 创建
impl GfxFence {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(GfxFenceInner {
                name: name.into(),
                completed: Mutex::new(0),
                condvar: Condvar::new(),
            }),
        }
    }
}

// getters
impl GfxFence {
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// 已完成的值
    #[inline]
    pub fn completed_value(&self) -> u64 {
        *self.inner.completed.lock().unwrap()
    }

    #[inline]
    pub fn is_complete(&self, value: u64) -> bool {
        self.completed_value() >= value
    }
}

// tools
impl GfxFence {
    /// 推进完成值；完成值只会前进
    pub fn signal(&self, value: u64) {
        let mut completed = self.inner.completed.lock().unwrap();
        if value > *completed {
            *completed = value;
            self.inner.condvar.notify_all();
        }
    }

    /// 阻塞等待完成值到达 value；已到达则立即返回
    pub fn wait(&self, value: u64) {
        let completed = self.inner.completed.lock().unwrap();
        let _guard = self
            .inner
            .condvar
            .wait_while(completed, |completed| *completed < value)
            .unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_then_wait_returns() {
        let fence = GfxFence::new("test");
        fence.signal(3);
        // 已完成的值，wait 立即返回
        fence.wait(3);
        fence.wait(1);
        assert_eq!(fence.completed_value(), 3);
    }

    #[test]
    fn test_completed_value_monotonic() {
        let fence = GfxFence::new("test");
        fence.signal(5);
        fence.signal(2);
        assert_eq!(fence.completed_value(), 5);
    }

    #[test]
    fn test_cross_thread_wait() {
        let fence = GfxFence::new("test");
        let other = fence.clone();
        let handle = std::thread::spawn(move || {
            other.wait(1);
            other.completed_value()
        });
        std::thread::sleep(std::time::Duration::from_millis(10));
        fence.signal(1);
        assert!(handle.join().unwrap() >= 1);
    }
}
