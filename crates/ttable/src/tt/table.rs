//! TranspositionTable本体
//!
//! - BucketTable: the aligned bucket array
//! - TranspositionTable: capacity, clear, generation, occupancy
//! - probe/write操作

use super::alloc::{AllocKind, Allocation};
use super::bucket::{Bucket, EntrySlot};
use super::entry::TTData;
use super::index::bucket_index;
use super::params::ReplacementParams;
use super::{ENTRY_COUNT, GENERATION_BITS, GENERATION_DELTA, HASHFULL_SAMPLE};
use crate::error::TtError;
use crate::pool::WorkerPool;
use crate::types::{Bound, Depth, Move, Value};
use std::ops::{Deref, Range};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

const MB: usize = 1024 * 1024;

enum Storage {
    /// Aligned block, possibly on large pages
    Mapped(Allocation),
    /// Small heap array standing in while no block is held
    Boxed(Box<[Bucket]>),
}

struct BucketTable {
    storage: Storage,
    len: usize,
}

impl BucketTable {
    /// Allocate `len` zeroed buckets
    fn allocate(len: usize) -> Result<Self, TtError> {
        let bytes = len
            .checked_mul(std::mem::size_of::<Bucket>())
            .ok_or(TtError::Layout { bytes: usize::MAX })?;
        let alloc = Allocation::allocate(bytes, std::mem::align_of::<Bucket>())?;
        Ok(Self {
            storage: Storage::Mapped(alloc),
            len,
        })
    }

    /// One empty bucket without a large-page block behind it
    fn single() -> Self {
        let buckets: Box<[Bucket]> = Box::new([Bucket::new()]);
        Self {
            storage: Storage::Boxed(buckets),
            len: 1,
        }
    }

    fn as_mut_ptr(&mut self) -> *mut Bucket {
        match &mut self.storage {
            Storage::Mapped(alloc) => alloc.ptr().as_ptr() as *mut Bucket,
            Storage::Boxed(buckets) => buckets.as_mut_ptr(),
        }
    }

    fn uses_large_pages(&self) -> bool {
        matches!(&self.storage, Storage::Mapped(alloc) if alloc.kind() == AllocKind::LargePages)
    }

    /// Bytes actually reserved, including alignment padding
    fn reserved_bytes(&self) -> usize {
        match &self.storage {
            Storage::Mapped(alloc) => alloc.size(),
            Storage::Boxed(buckets) => buckets.len() * std::mem::size_of::<Bucket>(),
        }
    }
}

impl Deref for BucketTable {
    type Target = [Bucket];

    fn deref(&self) -> &Self::Target {
        match &self.storage {
            // SAFETY: the block holds `len` buckets and is zero-filled at
            // allocation; an all-zero bucket is a valid bucket of atomics.
            Storage::Mapped(alloc) => unsafe {
                std::slice::from_raw_parts(alloc.ptr().as_ptr() as *const Bucket, self.len)
            },
            Storage::Boxed(buckets) => &buckets[..],
        }
    }
}

/// Transposition table
///
/// Shared by every search thread through `&self`. Entries are updated
/// without synchronisation (see the module docs). `resize` and `clear` take
/// `&mut self`, so they cannot overlap with probes.
pub struct TranspositionTable {
    /// Bucket array
    table: BucketTable,
    /// Bucket count
    bucket_count: usize,
    /// Generation counter (low 3 bits always zero)
    generation8: AtomicU8,
    /// Replacement tuning
    params: ReplacementParams,
}

impl TranspositionTable {
    /// Create a table of `mb_size` megabytes; failure is fatal
    pub fn new<P: WorkerPool + ?Sized>(mb_size: usize, pool: &P) -> Self {
        Self::with_params(mb_size, ReplacementParams::default(), pool)
    }

    /// Create a table with explicit replacement tuning; failure (allocation or
    /// out-of-range params) is fatal
    pub fn with_params<P: WorkerPool + ?Sized>(
        mb_size: usize,
        params: ReplacementParams,
        pool: &P,
    ) -> Self {
        Self::try_with_params(mb_size, params, pool)
            .unwrap_or_else(|err| setup_failure(mb_size, &err))
    }

    /// Fallible constructor
    pub fn try_new<P: WorkerPool + ?Sized>(mb_size: usize, pool: &P) -> Result<Self, TtError> {
        Self::try_with_params(mb_size, ReplacementParams::default(), pool)
    }

    /// Fallible constructor with explicit replacement tuning
    pub fn try_with_params<P: WorkerPool + ?Sized>(
        mb_size: usize,
        params: ReplacementParams,
        pool: &P,
    ) -> Result<Self, TtError> {
        Self::try_with_bytes(mb_size.saturating_mul(MB), params, pool)
    }

    /// Fallible constructor sized in bytes
    pub fn try_with_bytes<P: WorkerPool + ?Sized>(
        bytes: usize,
        params: ReplacementParams,
        pool: &P,
    ) -> Result<Self, TtError> {
        params.validate()?;
        let bucket_count = Self::buckets_for(bytes);
        let mut tt = Self {
            table: BucketTable::allocate(bucket_count)?,
            bucket_count,
            generation8: AtomicU8::new(0),
            params,
        };
        tt.clear(pool);
        log_resize(bytes, &tt);
        Ok(tt)
    }

    /// Resize to `mb_size` megabytes; allocation failure is fatal
    pub fn resize<P: WorkerPool + ?Sized>(&mut self, mb_size: usize, pool: &P) {
        if let Err(err) = self.try_resize(mb_size, pool) {
            setup_failure(mb_size, &err);
        }
    }

    /// Resize to `bytes`; allocation failure is fatal
    pub fn resize_bytes<P: WorkerPool + ?Sized>(&mut self, bytes: usize, pool: &P) {
        if let Err(err) = self.try_resize_bytes(bytes, pool) {
            setup_failure(bytes / MB, &err);
        }
    }

    /// Fallible resize; on error the previous allocation is already gone and
    /// the table is left at one empty bucket with generation 0
    pub fn try_resize<P: WorkerPool + ?Sized>(
        &mut self,
        mb_size: usize,
        pool: &P,
    ) -> Result<(), TtError> {
        self.try_resize_bytes(mb_size.saturating_mul(MB), pool)
    }

    /// Fallible resize sized in bytes
    pub fn try_resize_bytes<P: WorkerPool + ?Sized>(
        &mut self,
        bytes: usize,
        pool: &P,
    ) -> Result<(), TtError> {
        let new_count = Self::buckets_for(bytes);

        // 古い領域を先に解放してから確保する
        self.table = BucketTable::single();
        self.bucket_count = 1;
        self.generation8.store(0, Ordering::Relaxed);

        self.table = BucketTable::allocate(new_count)?;
        self.bucket_count = new_count;
        self.clear(pool);
        log_resize(bytes, self);
        Ok(())
    }

    /// Zero every bucket in parallel and reset the generation
    ///
    /// The array is split into `pool.num_threads()` contiguous stripes; the
    /// last stripe takes the remainder. Blocks until every worker is done.
    /// Stripes whose task was rejected, dropped or panicked are zeroed on the
    /// calling thread, so the table is always fully cleared on return.
    pub fn clear<P: WorkerPool + ?Sized>(&mut self, pool: &P) {
        self.generation8.store(0, Ordering::Relaxed);
        let len = self.bucket_count;
        let threads = pool.num_threads();
        let base = self.table.as_mut_ptr();

        if threads == 0 {
            // SAFETY: `base` points to `len` buckets owned by `self`
            unsafe { std::ptr::write_bytes(base, 0, len) };
            return;
        }

        let completed: Arc<[AtomicBool]> = (0..threads).map(|_| AtomicBool::new(false)).collect();
        let base_addr = base as usize;
        for i in 0..threads {
            let stripe = clear_stripe(len, threads, i);
            let completed = Arc::clone(&completed);
            pool.run_on_thread(
                i,
                Box::new(move || {
                    // SAFETY: stripes are disjoint sub-ranges of the array, and
                    // `clear` holds `&mut self` until `wait_on_thread` has
                    // returned for every worker (`WorkerPool` contract).
                    unsafe {
                        let ptr = (base_addr as *mut Bucket).add(stripe.start);
                        std::ptr::write_bytes(ptr, 0, stripe.len());
                    }
                    completed[i].store(true, Ordering::Release);
                }),
            );
        }

        for i in 0..threads {
            pool.wait_on_thread(i);
        }

        let mut fallback = 0;
        for (i, done) in completed.iter().enumerate() {
            if !done.load(Ordering::Acquire) {
                let stripe = clear_stripe(len, threads, i);
                // SAFETY: no task for this stripe can still run once
                // `wait_on_thread` has returned
                unsafe { std::ptr::write_bytes(base.add(stripe.start), 0, stripe.len()) };
                fallback += 1;
            }
        }
        if fallback > 0 {
            log::warn!("TT clear: {fallback} of {threads} stripes zeroed on the calling thread");
        }
        log::debug!("TT cleared: buckets={len} stripes={threads}");
    }

    /// Start a new search (advance the generation)
    pub fn new_search(&self) {
        self.generation8.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    /// Current generation
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation8.load(Ordering::Relaxed)
    }

    /// Look up `key`
    ///
    /// On a hit the writer points at the matching slot. Otherwise it points
    /// at the least valuable slot of the bucket, chosen by
    /// `depth8 - age_weight * relative_age`; nothing is modified until the
    /// writer is used.
    pub fn probe(&self, key: u64) -> ProbeResult<'_> {
        let key16 = key as u16;
        let bucket = self.bucket(key);

        for (i, entry) in bucket.entries().iter().enumerate() {
            if entry.key16() == key16 {
                let slot = bucket.slot(i);
                let found = entry.is_occupied();
                return ProbeResult {
                    found,
                    data: if found { slot.read() } else { TTData::EMPTY },
                    writer: TTWriter::new(slot, &self.params),
                };
            }
        }

        // 置換するエントリを選択（価値が最小のもの）
        let gen8 = self.generation();
        let age_weight = self.params.age_weight as i64;
        let replace = bucket
            .entries()
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.depth8() as i64 - age_weight * e.relative_age(gen8) as i64)
            .map_or(0, |(i, _)| i);

        #[cfg(feature = "diagnostics")]
        log::trace!("TT miss: key={key:#018x} victim={replace}");

        ProbeResult {
            found: false,
            data: TTData::EMPTY,
            writer: TTWriter::new(bucket.slot(replace), &self.params),
        }
    }

    /// Per-mille occupancy estimate
    ///
    /// Samples the first `HASHFULL_SAMPLE` buckets and counts occupied
    /// entries at most `max_age` generations old (`None`: current only).
    pub fn hashfull(&self, max_age: Option<u8>) -> i32 {
        let max_age_internal = (max_age.unwrap_or(0) as u16) << GENERATION_BITS;
        let gen8 = self.generation();
        let sample_count = HASHFULL_SAMPLE.min(self.bucket_count);

        let count: usize = self
            .table
            .iter()
            .take(sample_count)
            .map(|bucket| {
                bucket
                    .entries()
                    .iter()
                    .filter(|e| {
                        e.is_occupied() && e.relative_age(gen8) as u16 <= max_age_internal
                    })
                    .count()
            })
            .sum();

        (count * 1000 / (sample_count * ENTRY_COUNT)) as i32
    }

    /// Prefetch the bucket for `key`
    #[inline]
    pub fn prefetch(&self, key: u64) {
        let bucket = self.bucket(key);

        #[cfg(target_arch = "x86_64")]
        unsafe {
            use std::arch::x86_64::{_MM_HINT_T0, _mm_prefetch};
            _mm_prefetch::<_MM_HINT_T0>(bucket as *const Bucket as *const i8);
        }

        #[cfg(not(target_arch = "x86_64"))]
        let _ = bucket; // 何もしない
    }

    /// Bucket for `key`
    #[inline]
    pub fn bucket(&self, key: u64) -> &Bucket {
        &self.table[bucket_index(key, self.bucket_count)]
    }

    /// All buckets
    pub fn buckets(&self) -> &[Bucket] {
        &self.table
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }

    /// Bytes in use by the bucket array
    pub fn size_bytes(&self) -> usize {
        self.bucket_count * std::mem::size_of::<Bucket>()
    }

    /// Whether the array was allocated on (transparent) large pages
    pub fn uses_large_pages(&self) -> bool {
        self.table.uses_large_pages()
    }

    pub fn params(&self) -> &ReplacementParams {
        &self.params
    }

    fn buckets_for(bytes: usize) -> usize {
        (bytes / std::mem::size_of::<Bucket>()).max(1)
    }
}

/// Stripe of `0..len` zeroed by worker `index` out of `threads`
fn clear_stripe(len: usize, threads: usize, index: usize) -> Range<usize> {
    let stride = len / threads;
    let start = stride * index;
    let count = if index + 1 != threads { stride } else { len - start };
    start..start + count
}

fn log_resize(bytes: usize, tt: &TranspositionTable) {
    log::info!(
        "TT resize: requested={}B buckets={} size={}B large_pages={}",
        bytes,
        tt.bucket_count,
        tt.table.reserved_bytes(),
        tt.uses_large_pages()
    );
}

fn setup_failure(mb_size: usize, err: &TtError) -> ! {
    log::error!("Failed to set up {mb_size}MB transposition table: {err}");
    eprintln!("Failed to set up {mb_size}MB transposition table: {err}");
    std::process::exit(1);
}

/// probe結果
pub struct ProbeResult<'a> {
    /// Whether the key was found in an occupied slot
    pub found: bool,
    /// Data read (`TTData::EMPTY` unless found)
    pub data: TTData,
    /// Writer bound to the matching or victim slot
    pub writer: TTWriter<'a>,
}

/// Write capability for one slot
///
/// Several writers may target the same slot, from any thread.
#[derive(Clone, Copy)]
pub struct TTWriter<'a> {
    slot: EntrySlot<'a>,
    params: &'a ReplacementParams,
}

impl<'a> TTWriter<'a> {
    fn new(slot: EntrySlot<'a>, params: &'a ReplacementParams) -> Self {
        Self { slot, params }
    }

    /// Slot this writer targets
    pub fn slot(&self) -> EntrySlot<'a> {
        self.slot
    }

    /// Store a search result into the slot (racy)
    #[allow(clippy::too_many_arguments)]
    pub fn write(
        &self,
        key: u64,
        value: Value,
        is_pv: bool,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
        cut_flag: bool,
        generation8: u8,
    ) {
        self.slot.entry().save(
            key as u16,
            value,
            is_pv,
            bound,
            depth,
            mv,
            eval,
            cut_flag,
            generation8,
            self.slot.extra_bit(),
            self.params,
        );
    }
}
