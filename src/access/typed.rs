//! Raw memory access contract and the typed helpers layered on it.
//!
//! Backends implement [`MemoryAccess`]; every implementor gets
//! [`TypedAccess`] for free.
//!
//! # Example
//!
//! ```ignore
//! use memwire::access::{Format, Kind, TypedAccess};
//!
//! let counter: u16 = probe.read_as(0xAC25).await?;
//! probe.write_as(0x2000_0000, 0x1234_5678u32).await?;
//! let text = probe.read_formatted(0xC28A, Kind::F32, Format::Dec).await?;
//! ```

use std::future::Future;

use bytes::Bytes;

use super::format::{Format, Formatted};
use super::kind::{Kind, Scalar, Value};
use super::symbol::Symbol;
use super::text::{decode_cp1254, display_ascii};
use crate::error::{ProbeError, Result};

/// Byte-level read/write against target memory.
pub trait MemoryAccess: Send + Sync {
    /// Read exactly `byte_count` bytes starting at `address`.
    fn read(&self, address: u32, byte_count: usize) -> impl Future<Output = Result<Bytes>> + Send;

    /// Write `data` starting at `address`.
    fn write(&self, address: u32, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Smallest transfer the backend can perform, in bytes.
    ///
    /// Typed accesses narrower than this are widened.
    fn min_access_width(&self) -> usize {
        1
    }
}

/// Typed reads and writes over any [`MemoryAccess`].
pub trait TypedAccess: MemoryAccess {
    /// Read one value of `kind`.
    fn read_value(&self, address: u32, kind: Kind) -> impl Future<Output = Result<Value>> + Send {
        async move {
            let bytes = self.read(address, self.access_width(kind)).await?;
            kind.decode(&bytes)
        }
    }

    /// Read one value of `kind` and render it in `format`.
    fn read_formatted(
        &self,
        address: u32,
        kind: Kind,
        format: Format,
    ) -> impl Future<Output = Result<Formatted>> + Send {
        async move {
            let bytes = self.read(address, self.access_width(kind)).await?;
            format.apply(kind, &bytes)
        }
    }

    /// Write one value of `kind`.
    ///
    /// On backends with a wider minimum access the value is extended to the
    /// wider kind, which also overwrites the neighbouring byte.
    fn write_value(
        &self,
        address: u32,
        kind: Kind,
        value: Value,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            // Range check against the declared kind before widening
            kind.encode(value)?;
            let wire_kind = kind.widened(self.min_access_width());
            let bytes = wire_kind.encode(value)?;
            self.write(address, &bytes).await
        }
    }

    /// Read a primitive.
    fn read_as<T: Scalar>(&self, address: u32) -> impl Future<Output = Result<T>> + Send {
        async move { Ok(T::from_value(self.read_value(address, T::KIND).await?)) }
    }

    /// Write a primitive.
    fn write_as<T: Scalar>(
        &self,
        address: u32,
        value: T,
    ) -> impl Future<Output = Result<()>> + Send {
        async move { self.write_value(address, T::KIND, value.into_value()).await }
    }

    /// Read `count` consecutive elements, in address order.
    fn read_list<T: Scalar>(
        &self,
        address: u32,
        count: usize,
    ) -> impl Future<Output = Result<Vec<T>>> + Send {
        async move {
            let size = T::KIND.size();
            let total = count.checked_mul(size).ok_or_else(|| {
                ProbeError::Protocol(format!("List of {} {} elements is too large", count, T::KIND))
            })?;
            let bytes = self.read(address, total).await?;
            bytes
                .chunks_exact(size)
                .take(count)
                .map(|chunk| T::KIND.decode(chunk).map(T::from_value))
                .collect()
        }
    }

    /// Read `count` bytes as display text (see [`display_ascii`]).
    fn read_ascii(
        &self,
        address: u32,
        count: usize,
    ) -> impl Future<Output = Result<String>> + Send {
        async move { Ok(display_ascii(&self.read(address, count).await?)) }
    }

    /// Read `count` bytes of Windows-1254 text.
    fn read_cp1254(
        &self,
        address: u32,
        count: usize,
    ) -> impl Future<Output = Result<String>> + Send {
        async move { decode_cp1254(&self.read(address, count).await?) }
    }

    /// Read the variable described by `symbol`.
    fn read_symbol(
        &self,
        symbol: &Symbol,
        format: Format,
    ) -> impl Future<Output = Result<Formatted>> + Send {
        async move {
            let address = symbol.address()?;
            self.read_formatted(address, symbol.typ, format).await
        }
    }

    /// Write `text` (decimal, or hex when it contains `0x`) to `symbol`.
    fn write_symbol(&self, symbol: &Symbol, text: &str) -> impl Future<Output = Result<()>> + Send {
        async move {
            let address = symbol.address()?;
            let value = symbol.parse_value(text)?;
            tracing::debug!("Write {} {} to 0x{:08x}", symbol.typ, value, address);
            self.write_value(address, symbol.typ, value).await
        }
    }

    /// Bytes transferred for one value of `kind`.
    fn access_width(&self, kind: Kind) -> usize {
        kind.size().max(self.min_access_width())
    }
}

impl<T: MemoryAccess> TypedAccess for T {}
