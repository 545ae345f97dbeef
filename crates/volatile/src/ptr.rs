use core::ptr::NonNull;

/// A volatile non-null pointer to a value of type `T`.
///
/// This type is used to read and write values to memory without causing the compiler to optimize
/// away the reads and writes.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct VolatilePtr<T> {
    ptr: NonNull<T>,
}

impl<T> VolatilePtr<T> {
    /// Creates a new `VolatilePtr` from a raw pointer.
    ///
    /// Returns `None` if the pointer is null.
    ///
    /// # Examples
    /// ```
    /// use volatile::ptr::VolatilePtr;
    ///
    /// let mut x = 0u8;
    /// let ptr = VolatilePtr::new(&mut x).unwrap();
    /// ptr.set(1);
    /// assert_eq!(ptr.get(), 1);
    /// ```
    pub fn new(ptr: *mut T) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr })
    }

    /// Creates a new `VolatilePtr` from a raw pointer without checking for null.
    ///
    /// # Safety
    /// The caller must ensure that the pointer is non-null.
    pub const unsafe fn new_unchecked(ptr: *mut T) -> Self {
        Self {
            ptr: unsafe { NonNull::new_unchecked(ptr) },
        }
    }

    /// The underlying pointer. Any access through it must be volatile as well.
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Reinterprets the pointer as pointing to a `U` located `offset` bytes further.
    ///
    /// # Safety
    /// The resulting pointer must stay inside the same allocation / mapping, and be
    /// suitably aligned for `U` if it is dereferenced.
    pub unsafe fn byte_add<U>(self, offset: usize) -> VolatilePtr<U> {
        VolatilePtr {
            ptr: unsafe { self.ptr.byte_add(offset).cast::<U>() },
        }
    }

    /// Volatile reads the value from the pointer.
    pub fn get(&self) -> T {
        unsafe { self.ptr.read_volatile() }
    }

    /// Volatile writes the value to the pointer.
    pub fn set(&self, value: T) {
        unsafe { self.ptr.write_volatile(value) }
    }
}

unsafe impl<T: Send> Send for VolatilePtr<T> {}
unsafe impl<T: Send + Sync> Sync for VolatilePtr<T> {}
