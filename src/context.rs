//! State shared by every stage of one compile.

use crate::float_types::Real;
use crate::map::texinfo::TexInfo;
use crate::options::CompileOptions;
use crate::plane::PlaneTable;
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Owns the plane and texinfo tables plus the options of one compile.
///
/// Stages borrow the context immutably; the tables use interior locking so
/// brush loading can run on the rayon pool.
#[derive(Debug)]
pub struct CompileContext {
    pub options: CompileOptions,
    pub planes: PlaneTable,
    pub texinfos: TexInfoTable,
}

impl CompileContext {
    pub fn new(options: CompileOptions) -> Self {
        CompileContext {
            options,
            planes: PlaneTable::new(),
            texinfos: TexInfoTable::default(),
        }
    }

    #[inline]
    pub fn epsilon(&self) -> Real {
        self.options.on_epsilon
    }
}

impl Default for CompileContext {
    fn default() -> Self {
        Self::new(CompileOptions::default())
    }
}

/// Deduplicated texture projections.
#[derive(Debug, Default)]
pub struct TexInfoTable {
    inner: Mutex<(Vec<TexInfo>, HashMap<TexInfo, usize>)>,
}

impl TexInfoTable {
    pub fn find_or_insert(&self, texinfo: TexInfo) -> usize {
        let mut guard = self.inner.lock();
        let (list, index) = &mut *guard;
        if let Some(&i) = index.get(&texinfo) {
            return i;
        }
        let i = list.len();
        list.push(texinfo.clone());
        index.insert(texinfo, i);
        i
    }

    pub fn get(&self, index: usize) -> TexInfo {
        self.inner.lock().0[index].clone()
    }

    pub fn snapshot(&self) -> Vec<TexInfo> {
        self.inner.lock().0.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Best-effort progress reporting for long stages.
///
/// Workers bump the counter; whichever worker crosses a 10% step first wins
/// the compare-exchange and logs it.
#[derive(Debug)]
pub struct Progress {
    stage: &'static str,
    total: usize,
    count: AtomicUsize,
    reported: AtomicUsize,
}

impl Progress {
    pub fn new(stage: &'static str, total: usize) -> Self {
        Progress {
            stage,
            total,
            count: AtomicUsize::new(0),
            reported: AtomicUsize::new(0),
        }
    }

    pub fn tick(&self) {
        let count = self.count.fetch_add(1, Ordering::Relaxed) + 1;
        if self.total == 0 {
            return;
        }
        let step = (count * 10 / self.total).min(10);
        let last = self.reported.load(Ordering::Relaxed);
        if step > last
            && self
                .reported
                .compare_exchange(last, step, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
        {
            log::debug!("{}: {}%", self.stage, step * 10);
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }
}
