//! Core of a distributed linear-program solver that attacks large-scale
//! LPs by Lagrangian dual decomposition (see `SPEC_FULL.md`).
//!
//! The engineering depth lives in [`optim`] (the dual-ascent maximizers
//! and their convergence controllers) and [`objective`] (the contract
//! those maximizers consume). [`driver`] composes the two; [`serializer`]
//! and [`dual_loader`] are the I/O boundary.

use std::any::Any;

use dyn_clone::DynClone;
use macros::build_options;

pub type E = f64;
pub type I = usize;

pub mod callback;
pub mod driver;
pub mod dual_loader;
pub mod objective;
pub mod optim;
pub mod serializer;
pub mod sparse;

pub use optim::Status;

pub trait OptionTrait: Any + Sync + Send + DynClone {}
impl OptionTrait for &'static str {}
impl OptionTrait for String {}
impl OptionTrait for bool {}
impl OptionTrait for usize {}
impl OptionTrait for u8 {}
impl OptionTrait for u16 {}
impl OptionTrait for u32 {}
impl OptionTrait for u64 {}
impl OptionTrait for i8 {}
impl OptionTrait for i16 {}
impl OptionTrait for i32 {}
impl OptionTrait for i64 {}
impl OptionTrait for f32 {}
impl OptionTrait for f64 {}

impl Clone for Box<dyn OptionTrait> {
    fn clone(&self) -> Self {
        dyn_clone::clone_box(&**self)
    }
}

build_options!(name = SolverOptions, registry_name = OPTION_REGISTRY);

// The retrieved `options` proc-macro always names its generated struct
// `Options`; every call site in this crate (following the teacher) spells
// it `SolverOptions`, so alias it here rather than touch shared tooling.
pub type SolverOptions = Options;
