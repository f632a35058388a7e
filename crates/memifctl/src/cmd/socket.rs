use memifctl_api::{Request, SocketFilenameAddDel};

use crate::input::{InputError, TokenInput};

pub fn add_del(input: &mut TokenInput) -> Result<Request, InputError> {
    parse(input).map(Request::SocketFilenameAddDel)
}

pub fn add_del_v2(input: &mut TokenInput) -> Result<Request, InputError> {
    parse(input).map(Request::SocketFilenameAddDelV2)
}

fn parse(input: &mut TokenInput) -> Result<SocketFilenameAddDel, InputError> {
    let mut is_add = true;
    let mut socket_id: Option<u32> = None;
    let mut filename = String::new();

    while let Some(token) = input.next_token() {
        match token.as_str() {
            "id" => socket_id = Some(input.value("id")?),
            "filename" => filename = input.value("filename")?,
            "add" => is_add = true,
            "del" => is_add = false,
            _ => return Err(InputError::Unknown(token)),
        }
    }

    let socket_id = match socket_id {
        Some(id) if id != 0 && id != u32::MAX => id,
        Some(id) => {
            return Err(InputError::Rejected(format!(
                "socket id {id} is reserved"
            )))
        }
        None => return Err(InputError::Rejected("socket id required".to_string())),
    };
    if is_add && filename.is_empty() {
        return Err(InputError::Rejected(
            "filename required when adding a socket".to_string(),
        ));
    }
    if !is_add {
        filename.clear();
    }

    Ok(SocketFilenameAddDel {
        is_add,
        socket_id,
        filename,
    })
}
