use crate::error::TtError;
use std::alloc::Layout;
use std::ptr::NonNull;

#[cfg(not(windows))]
use std::alloc::{alloc_zeroed, dealloc};
#[cfg(not(windows))]
use std::cmp::max;

#[cfg(windows)]
use windows_sys::Win32::Foundation::GetLastError;
#[cfg(windows)]
use windows_sys::Win32::System::Memory::{
    MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE, VirtualAlloc, VirtualFree,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum AllocKind {
    /// 2MB aligned and advised for transparent huge pages
    #[allow(dead_code)]
    LargePages,
    /// 通常ページ（macOS / Windows 等）
    #[allow(dead_code)]
    Regular,
}

/// Raw aligned block backing the bucket array
///
/// The memory is zero-filled on return. An all-zero bucket is a valid empty
/// bucket, so the block is usable before the first `clear`.
pub(super) struct Allocation {
    ptr: NonNull<u8>,
    size: usize,
    kind: AllocKind,
    #[cfg(not(windows))]
    layout: Layout,
}

impl Allocation {
    pub(super) fn allocate(size: usize, alignment: usize) -> Result<Self, TtError> {
        if size == 0 {
            return Err(TtError::Layout { bytes: size });
        }

        #[cfg(windows)]
        {
            let _ = alignment;
            return alloc_windows(size);
        }

        #[cfg(not(windows))]
        {
            alloc_unix(size, alignment)
        }
    }

    pub(super) fn ptr(&self) -> NonNull<u8> {
        self.ptr
    }

    pub(super) fn size(&self) -> usize {
        self.size
    }

    pub(super) fn kind(&self) -> AllocKind {
        self.kind
    }
}

#[cfg(windows)]
fn alloc_windows(size: usize) -> Result<Allocation, TtError> {
    // VirtualAlloc returns page-aligned, zero-filled memory
    Layout::from_size_align(size, 4096).map_err(|_| TtError::Layout { bytes: size })?;
    let ptr =
        unsafe { VirtualAlloc(std::ptr::null(), size, MEM_RESERVE | MEM_COMMIT, PAGE_READWRITE) };
    let ptr = NonNull::new(ptr as *mut u8).ok_or(TtError::OutOfMemory { bytes: size })?;
    Ok(Allocation {
        ptr,
        size,
        kind: AllocKind::Regular,
    })
}

#[cfg(not(windows))]
fn alloc_unix(size: usize, alignment: usize) -> Result<Allocation, TtError> {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let (page_align, kind) = (2 * 1024 * 1024, AllocKind::LargePages);
    #[cfg(not(any(target_os = "linux", target_os = "android")))]
    let (page_align, kind) = (4096, AllocKind::Regular);

    let alignment = max(alignment, page_align);
    let layout = Layout::from_size_align(size, alignment)
        .map_err(|_| TtError::Layout { bytes: size })?
        .pad_to_align();
    // SAFETY: the layout has non-zero size
    let ptr = unsafe { alloc_zeroed(layout) };
    let ptr = NonNull::new(ptr).ok_or(TtError::OutOfMemory {
        bytes: layout.size(),
    })?;

    #[cfg(any(target_os = "linux", target_os = "android"))]
    {
        // SAFETY: ptr/len describe the block just allocated
        let result =
            unsafe { libc::madvise(ptr.as_ptr() as *mut _, layout.size(), libc::MADV_HUGEPAGE) };
        // madvise失敗は動作に影響しないが、パフォーマンスに影響する可能性がある
        if result != 0 {
            log::warn!("madvise(MADV_HUGEPAGE) failed for {} bytes", layout.size());
        }
    }

    Ok(Allocation {
        ptr,
        size: layout.size(),
        kind,
        layout,
    })
}

impl Drop for Allocation {
    fn drop(&mut self) {
        unsafe {
            #[cfg(windows)]
            {
                let ok = VirtualFree(self.ptr.as_ptr() as *mut _, 0, MEM_RELEASE);
                if ok == 0 {
                    // リソースリークの可能性があるため、リリースビルドでも警告を出力
                    log::warn!("VirtualFree failed with error {}", GetLastError());
                    debug_assert!(false, "VirtualFree failed");
                }
            }
            #[cfg(not(windows))]
            {
                dealloc(self.ptr.as_ptr(), self.layout);
            }
        }
    }
}

// SAFETY: Allocation owns raw memory for the TT; access goes through the
// bucket atomics or through `&mut` on the owning table.
unsafe impl Send for Allocation {}
unsafe impl Sync for Allocation {}
