//! Built-in command handlers.

use serde_json::Value;

use super::envelope::{Fields, Request, MAX_TRANSFER_SIZE};
use super::table::{BoxFuture, CommandTable, Handler};
use super::CommandRouter;
use crate::access::MemoryAccess;
use crate::error::Result;
use crate::probe::Probe;

/// Table with every built-in command.
pub fn standard_table() -> CommandTable {
    let mut table = CommandTable::new();
    table.register("list_devices", 0, Handler::Sync(list_devices));
    table.register("list_probes", 0, Handler::Sync(list_probes));
    table.register("set_probe", 1, Handler::Async(set_probe));
    table.register("connect", 0, Handler::Async(connect));
    table.register("disconnect", 0, Handler::Async(disconnect));
    table.register("read", 2, Handler::Async(read));
    table.register("write", 2, Handler::Async(write));
    table
}

fn fields<const N: usize>(entries: [(&str, Value); N]) -> Fields {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

fn list_devices(router: &CommandRouter, _: &Request) -> Result<Fields> {
    let devices = serde_json::to_value(router.backend().list_devices())?;
    Ok(fields([("devices", devices)]))
}

fn list_probes(router: &CommandRouter, _: &Request) -> Result<Fields> {
    Ok(fields([("probes", Value::from(router.registry().names()))]))
}

fn set_probe<'a>(router: &'a CommandRouter, request: &'a Request) -> BoxFuture<'a, Result<Fields>> {
    Box::pin(async move {
        let name = request.str("probe_name")?;
        router.select(name).await?;
        Ok(fields([
            ("probe", Value::from(name)),
            ("msg", Value::from("Probe set successfully")),
        ]))
    })
}

fn connect<'a>(router: &'a CommandRouter, request: &'a Request) -> BoxFuture<'a, Result<Fields>> {
    Box::pin(async move {
        let uri = request.opt_str("uri")?;
        let is_open = router.backend().connect(uri).await;
        Ok(fields([("is_open", Value::from(is_open))]))
    })
}

fn disconnect<'a>(router: &'a CommandRouter, _: &'a Request) -> BoxFuture<'a, Result<Fields>> {
    Box::pin(async move {
        let is_open = router.backend().disconnect().await;
        Ok(fields([("is_open", Value::from(is_open))]))
    })
}

fn read<'a>(router: &'a CommandRouter, request: &'a Request) -> BoxFuture<'a, Result<Fields>> {
    Box::pin(async move {
        let address = request.address("addr")?;
        let count = request.count("nb", MAX_TRANSFER_SIZE)?;
        tracing::debug!("Read {} bytes from address 0x{:08x}", count, address);
        let bytes = router.backend().read(address, count).await?;
        Ok(fields([("data", Value::from(hex::encode(&bytes)))]))
    })
}

fn write<'a>(router: &'a CommandRouter, request: &'a Request) -> BoxFuture<'a, Result<Fields>> {
    Box::pin(async move {
        let address = request.address("addr")?;
        let data = hex::decode(request.str("data")?)?;
        tracing::debug!("Write {} bytes to address 0x{:08x}", data.len(), address);
        router.backend().write(address, &data).await?;
        Ok(Fields::new())
    })
}
