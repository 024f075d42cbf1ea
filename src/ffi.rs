//! Minimal C ABI surface: segment create/open/close and a fixed-width
//! `u64` queue's create/open/push/pop, following the opaque-boxed-
//! handle plus `#[no_mangle] extern "C" fn` plus manual error-code enum
//! shape common to FFI layers in this style. Not exhaustive: the rest
//! of the structures are meant to be reached from Rust, or from other
//! languages via a safe binding layered on top of this minimum.

use crate::segment::Segment;
use crate::structures::Queue;
use std::ffi::{c_char, CStr};
use std::ptr;

const ZEROIPC_OK: i32 = 0;
const ZEROIPC_ERR_NULL_POINTER: i32 = -1;
const ZEROIPC_ERR_INVALID_ARG: i32 = -2;
const ZEROIPC_ERR_FULL: i32 = -3;
const ZEROIPC_ERR_EMPTY: i32 = -4;
const ZEROIPC_ERR_INTERNAL: i32 = -5;

/// Opaque handle to an attached segment.
pub struct ZeroipcSegment {
    inner: Segment,
}

/// Opaque handle to a `u64` queue bound to some segment.
pub struct ZeroipcQueue {
    inner: Queue<u64>,
}

unsafe fn name_from_ptr<'a>(name: *const c_char) -> Option<&'a str> {
    if name.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(name) }.to_str().ok()
}

/// Create a new named segment of `size` bytes. Returns NULL on failure.
#[no_mangle]
pub extern "C" fn zeroipc_segment_create(
    name: *const c_char,
    size: usize,
) -> *mut ZeroipcSegment {
    let Some(name) = (unsafe { name_from_ptr(name) }) else {
        return ptr::null_mut();
    };
    match Segment::create(name, size) {
        Ok(inner) => Box::into_raw(Box::new(ZeroipcSegment { inner })),
        Err(e) => {
            log::warn!("zeroipc_segment_create failed: {e}");
            ptr::null_mut()
        }
    }
}

/// Attach to an existing named segment. Returns NULL on failure.
#[no_mangle]
pub extern "C" fn zeroipc_segment_open(
    name: *const c_char,
    size: usize,
) -> *mut ZeroipcSegment {
    let Some(name) = (unsafe { name_from_ptr(name) }) else {
        return ptr::null_mut();
    };
    match Segment::open(name, size) {
        Ok(inner) => Box::into_raw(Box::new(ZeroipcSegment { inner })),
        Err(e) => {
            log::warn!("zeroipc_segment_open failed: {e}");
            ptr::null_mut()
        }
    }
}

/// Release a segment handle. Does not unlink the underlying shared
/// memory object; use `zeroipc_segment_unlink` for that.
#[no_mangle]
pub extern "C" fn zeroipc_segment_close(handle: *mut ZeroipcSegment) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle);
        }
    }
}

/// Remove the named segment from the system.
#[no_mangle]
pub extern "C" fn zeroipc_segment_unlink(name: *const c_char) -> i32 {
    let Some(name) = (unsafe { name_from_ptr(name) }) else {
        return ZEROIPC_ERR_INVALID_ARG;
    };
    match Segment::unlink(name) {
        Ok(()) => ZEROIPC_OK,
        Err(_) => ZEROIPC_ERR_INTERNAL,
    }
}

/// Create a `u64` queue of `capacity` elements inside `segment`.
#[no_mangle]
pub extern "C" fn zeroipc_queue_create(
    segment: *mut ZeroipcSegment,
    name: *const c_char,
    capacity: usize,
) -> *mut ZeroipcQueue {
    if segment.is_null() {
        return ptr::null_mut();
    }
    let Some(name) = (unsafe { name_from_ptr(name) }) else {
        return ptr::null_mut();
    };
    let segment = unsafe { &(*segment).inner };
    match Queue::<u64>::create(segment, name, capacity) {
        Ok(inner) => Box::into_raw(Box::new(ZeroipcQueue { inner })),
        Err(e) => {
            log::warn!("zeroipc_queue_create failed: {e}");
            ptr::null_mut()
        }
    }
}

/// Attach to an existing `u64` queue by name inside `segment`.
#[no_mangle]
pub extern "C" fn zeroipc_queue_open(
    segment: *mut ZeroipcSegment,
    name: *const c_char,
) -> *mut ZeroipcQueue {
    if segment.is_null() {
        return ptr::null_mut();
    }
    let Some(name) = (unsafe { name_from_ptr(name) }) else {
        return ptr::null_mut();
    };
    let segment = unsafe { &(*segment).inner };
    match Queue::<u64>::open(segment, name) {
        Ok(inner) => Box::into_raw(Box::new(ZeroipcQueue { inner })),
        Err(e) => {
            log::warn!("zeroipc_queue_open failed: {e}");
            ptr::null_mut()
        }
    }
}

/// Push `value` onto the queue.
#[no_mangle]
pub extern "C" fn zeroipc_queue_push(handle: *mut ZeroipcQueue, value: u64) -> i32 {
    if handle.is_null() {
        return ZEROIPC_ERR_NULL_POINTER;
    }
    let queue = unsafe { &(*handle).inner };
    match queue.push(value) {
        Ok(()) => ZEROIPC_OK,
        Err(crate::Error::Full) => ZEROIPC_ERR_FULL,
        Err(_) => ZEROIPC_ERR_INTERNAL,
    }
}

/// Pop a value into `*out_value`. Returns `ZEROIPC_ERR_EMPTY` if nothing
/// is queued right now.
#[no_mangle]
pub extern "C" fn zeroipc_queue_pop(handle: *mut ZeroipcQueue, out_value: *mut u64) -> i32 {
    if handle.is_null() || out_value.is_null() {
        return ZEROIPC_ERR_NULL_POINTER;
    }
    let queue = unsafe { &(*handle).inner };
    match queue.pop() {
        Ok(value) => {
            unsafe { *out_value = value };
            ZEROIPC_OK
        }
        Err(crate::Error::Empty) => ZEROIPC_ERR_EMPTY,
        Err(_) => ZEROIPC_ERR_INTERNAL,
    }
}

/// Release a queue handle. Does not affect the underlying segment.
#[no_mangle]
pub extern "C" fn zeroipc_queue_close(handle: *mut ZeroipcQueue) {
    if !handle.is_null() {
        unsafe {
            let _ = Box::from_raw(handle);
        }
    }
}
