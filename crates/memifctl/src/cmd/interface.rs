use memifctl_api::bits::is_pow2;
use memifctl_api::{
    CreateInterface, DeleteInterface, InterfaceMode, InterfaceRole, MacAddress, Request,
    MAX_SECRET_LEN,
};

use crate::input::{InputError, TokenInput};

pub fn create(input: &mut TokenInput) -> Result<Request, InputError> {
    let mut req = CreateInterface::default();

    while let Some(token) = input.next_token() {
        match token.as_str() {
            "id" => req.id = input.value("id")?,
            "socket-id" => req.socket_id = socket_id(input)?,
            "secret" => req.secret = Some(secret(input)?),
            "ring_size" => req.ring_size = ring_size(input)?,
            "buffer_size" => req.buffer_size = buffer_size(input)?,
            "master" => req.role = InterfaceRole::Master,
            "slave" => req.role = InterfaceRole::Slave,
            "rx-queues" => req.rx_queues = queues(input, "rx-queues")?,
            "tx-queues" => req.tx_queues = queues(input, "tx-queues")?,
            "mode" => req.mode = mode(input)?,
            "hw_addr" => req.hw_addr = input.value::<MacAddress>("hw_addr")?,
            _ => return Err(InputError::Unknown(token)),
        }
    }

    Ok(Request::Create(req))
}

pub fn delete(input: &mut TokenInput) -> Result<Request, InputError> {
    let mut sw_if_index = None;

    while let Some(token) = input.next_token() {
        match token.as_str() {
            "sw_if_index" => sw_if_index = Some(input.value("sw_if_index")?),
            _ => return Err(InputError::Unknown(token)),
        }
    }

    let sw_if_index =
        sw_if_index.ok_or_else(|| InputError::Rejected("sw_if_index required".to_string()))?;
    Ok(Request::Delete(DeleteInterface { sw_if_index }))
}

fn socket_id(input: &mut TokenInput) -> Result<u32, InputError> {
    let id: u32 = input.value("socket-id")?;
    if id == u32::MAX {
        return Err(invalid("socket-id", id, "reserved socket id"));
    }
    Ok(id)
}

fn secret(input: &mut TokenInput) -> Result<String, InputError> {
    let secret: String = input.value("secret")?;
    if secret.is_empty() {
        return Err(invalid("secret", &secret, "must not be empty"));
    }
    if secret.len() > MAX_SECRET_LEN {
        return Err(invalid(
            "secret",
            &secret,
            format!("longer than {MAX_SECRET_LEN} bytes"),
        ));
    }
    Ok(secret)
}

// Zero passes the power-of-two check and leaves the choice to the dataplane.
fn ring_size(input: &mut TokenInput) -> Result<u32, InputError> {
    let size: u32 = input.value("ring_size")?;
    if !is_pow2(u64::from(size)) {
        return Err(invalid("ring_size", size, "must be a power of 2"));
    }
    Ok(size)
}

fn buffer_size(input: &mut TokenInput) -> Result<u16, InputError> {
    let size: u32 = input.value("buffer_size")?;
    u16::try_from(size).map_err(|_| invalid("buffer_size", size, "must not exceed 65535"))
}

fn queues(input: &mut TokenInput, key: &'static str) -> Result<u8, InputError> {
    let count: u32 = input.value(key)?;
    match u8::try_from(count) {
        Ok(count) if count > 0 => Ok(count),
        _ => Err(invalid(key, count, "must be between 1 and 255")),
    }
}

fn mode(input: &mut TokenInput) -> Result<InterfaceMode, InputError> {
    let mode: String = input.value("mode")?;
    match mode.as_str() {
        "ethernet" => Ok(InterfaceMode::Ethernet),
        "ip" => Ok(InterfaceMode::Ip),
        _ => Err(invalid("mode", &mode, "expected ip or ethernet")),
    }
}

fn invalid(
    key: &'static str,
    value: impl ToString,
    reason: impl Into<String>,
) -> InputError {
    InputError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}
