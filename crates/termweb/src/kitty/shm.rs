//! C3 — POSIX shared-memory segment for the Kitty zero-copy fast path.
//! Scoped acquisition with guaranteed unlink on drop; env override and
//! graceful-fallback handled by the caller (`kitty::emitter`).

use std::ffi::CString;

use crate::error::ShmError;

pub struct ShmBuffer {
    name: String,
    fd: libc::c_int,
    ptr: *mut libc::c_void,
    len: usize,
}

unsafe impl Send for ShmBuffer {}

impl ShmBuffer {
    /// Allocates a segment sized for `max_width * max_height * 4` bytes
    /// (RGBA). Never resized under a live placement — callers that need a
    /// bigger frame allocate a fresh segment with a new name.
    pub fn create(max_width: u32, max_height: u32) -> Result<Self, ShmError> {
        let len = (max_width as usize)
            .saturating_mul(max_height as usize)
            .saturating_mul(4);
        if len == 0 {
            return Err(ShmError::TooSmall(max_width, max_height));
        }

        let name = format!("/termweb-{}-{}", std::process::id(), uuid::Uuid::new_v4().simple());
        let c_name = CString::new(name.clone()).expect("shm name has no NUL bytes");

        let fd = unsafe {
            libc::shm_open(
                c_name.as_ptr(),
                libc::O_CREAT | libc::O_RDWR | libc::O_EXCL,
                0o600,
            )
        };
        if fd < 0 {
            return Err(ShmError::Open(std::io::Error::last_os_error()));
        }

        if unsafe { libc::ftruncate(fd, len as libc::off_t) } != 0 {
            let err = std::io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(ShmError::Open(err));
        }

        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            let err = std::io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(ShmError::Map(err));
        }

        Ok(Self { name, fd, ptr, len })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copies `data` into the segment, truncated to its capacity. Returns
    /// the number of bytes written.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(self.len);
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), self.ptr as *mut u8, n);
        }
        n
    }
}

impl Drop for ShmBuffer {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr, self.len);
            libc::close(self.fd);
            if let Ok(c_name) = CString::new(self.name.clone()) {
                libc::shm_unlink(c_name.as_ptr());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_zero_size() {
        assert!(matches!(ShmBuffer::create(0, 0), Err(ShmError::TooSmall(0, 0))));
    }

    #[test]
    fn create_and_write_roundtrip() {
        let mut shm = ShmBuffer::create(4, 4).expect("shm create");
        assert_eq!(shm.len(), 64);
        let data = vec![0xABu8; 64];
        assert_eq!(shm.write(&data), 64);
        assert!(shm.name().starts_with("/termweb-"));
    }

    #[test]
    fn write_truncates_to_capacity() {
        let mut shm = ShmBuffer::create(2, 2).expect("shm create");
        let data = vec![1u8; 1000];
        assert_eq!(shm.write(&data), shm.len());
    }
}
