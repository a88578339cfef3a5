//! Core types shared by every vmcore component.
//!
//! This crate defines the address newtypes ([`Pa`], [`Va`], [`Gfn`]), the
//! common error type ([`VmcoreError`]) and the memory windows every other
//! layer reads guest memory through:
//!
//! - [`Memory`] is a bounds-checked, absolutely-addressed view over a
//!   shared [`Arena`] of bytes (usually a memory-mapped coredump segment).
//! - [`MappedMemory`] is a physical window that is also known at a virtual
//!   address, such as the located kernel image.
//! - [`PhysicalMemory`] abstracts over anything that can hand out physical
//!   windows.

mod arena;
mod core;
mod error;
mod memory;
mod physical;

pub use self::{
    arena::Arena,
    core::{Address, Gfn, Hex, Pa, Va},
    error::VmcoreError,
    memory::{MappedMemory, Memory},
    physical::PhysicalMemory,
};
