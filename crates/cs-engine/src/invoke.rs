//! Typed invocation of compiled entry points
//!
//! The caller states the whole signature through type parameters: a tuple
//! of argument types implementing [`CArgs`] and a return type implementing
//! [`CReturn`]. Only C-compatible scalars and raw pointers are accepted, so
//! an unsupported shape fails to compile instead of reaching the call.
//!
//! Compiled code carries no type information, so nothing can check that the
//! stated signature matches the C definition. A mismatch is undefined
//! behaviour, which is why every call site is `unsafe`.

use std::marker::PhantomData;
use std::ptr::NonNull;

use libc::c_void;

mod sealed {
    pub trait Value {}
    pub trait Args {}
}

/// A C-compatible scalar that can cross the script boundary
pub trait CValue: sealed::Value + Copy {}

/// A return type: any [`CValue`], or `()` for `void`
pub trait CReturn: sealed::Value {}

macro_rules! impl_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl sealed::Value for $ty {}
            impl CValue for $ty {}
        )*
    };
}

impl_value!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, bool);

impl<T> sealed::Value for *const T {}
impl<T> CValue for *const T {}
impl<T> sealed::Value for *mut T {}
impl<T> CValue for *mut T {}

impl sealed::Value for () {}
impl CReturn for () {}
impl<T: CValue> CReturn for T {}

/// A tuple of arguments, called positionally
pub trait CArgs: sealed::Args + Sized {
    /// Number of arguments
    const ARITY: usize;

    /// Call `address` as `extern "C" fn(Self...) -> R`
    ///
    /// # Safety
    ///
    /// `address` must point to a function with exactly this signature.
    unsafe fn call<R: CReturn>(self, address: NonNull<c_void>) -> R;
}

macro_rules! impl_args {
    ($count:expr; $($name:ident),*) => {
        impl<$($name: CValue),*> sealed::Args for ($($name,)*) {}

        impl<$($name: CValue),*> CArgs for ($($name,)*) {
            const ARITY: usize = $count;

            #[allow(non_snake_case)]
            unsafe fn call<R: CReturn>(self, address: NonNull<c_void>) -> R {
                let function = std::mem::transmute_copy::<*mut c_void, unsafe extern "C" fn($($name),*) -> R>(
                    &address.as_ptr(),
                );
                let ($($name,)*) = self;
                function($($name),*)
            }
        }
    };
}

impl_args!(0;);
impl_args!(1; A);
impl_args!(2; A, B);
impl_args!(3; A, B, C);
impl_args!(4; A, B, C, D);
impl_args!(5; A, B, C, D, E);
impl_args!(6; A, B, C, D, E, F);
impl_args!(7; A, B, C, D, E, F, G);
impl_args!(8; A, B, C, D, E, F, G, H);

/// A function in the current compiled program
///
/// Borrows the engine, so it cannot outlive the session it came from.
pub struct Function<'a, A, R> {
    address: NonNull<c_void>,
    _session: PhantomData<&'a ()>,
    _signature: PhantomData<fn(A) -> R>,
}

impl<'a, A: CArgs, R: CReturn> Function<'a, A, R> {
    pub(crate) fn new(address: NonNull<c_void>) -> Self {
        Self {
            address,
            _session: PhantomData,
            _signature: PhantomData,
        }
    }

    /// Address of the compiled function
    pub fn address(&self) -> NonNull<c_void> {
        self.address
    }

    /// Call the function. Its stdout is not captured.
    ///
    /// # Safety
    ///
    /// The compiled function must have the signature `R (A...)`.
    pub unsafe fn call(&self, args: A) -> R {
        args.call(self.address)
    }
}

impl<A, R> std::fmt::Debug for Function<'_, A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Function")
            .field("address", &self.address)
            .field("signature", &std::any::type_name::<fn(A) -> R>())
            .finish()
    }
}
