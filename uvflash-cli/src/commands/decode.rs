//! Decode command implementation.

use anyhow::{Context, Result};
use uvflash::{Message, WriteStatus};

use super::transfer::hexdump;

/// Render a decoded message for humans.
fn describe(message: &Message<'_>) -> String {
    match message {
        Message::ReadRequest(req) => format!(
            "flash read request (0x542B)\n  address:   {:#08x}\n  size:      {}\n  timestamp: {:#010x}\n",
            req.address, req.size, req.timestamp
        ),
        Message::ReadReply(reply) => format!(
            "flash read reply (0x542C)\n  address:   {:#08x}\n  size:      {}\n{}",
            reply.address,
            reply.size,
            hexdump(reply.address, &reply.data)
        ),
        Message::WriteRequest(req) => {
            let mut text = format!(
                "flash write request (0x5438)\n  address:   {:#08x}\n  size:      {}\n  timestamp: {:#010x}\n",
                req.address, req.size, req.timestamp
            );
            if !req.is_complete() {
                text.push_str(&format!(
                    "  warning:   frame carries only {} of {} data bytes\n",
                    req.data.len(),
                    req.size
                ));
            }
            text.push_str(&hexdump(req.address, req.data));
            text
        },
        Message::WriteReply(reply) => format!(
            "flash write reply (0x5439)\n  address:   {:#08x}\n  status:    {}\n",
            reply.address,
            match reply.status {
                WriteStatus::Ok => "0 (ok)",
                WriteStatus::Error => "1 (error)",
            }
        ),
    }
}

pub(crate) fn cmd_decode(frame: &[u8], json: bool) -> Result<()> {
    let message = Message::decode(frame).context("Failed to decode frame")?;
    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else {
        print!("{}", describe(&message));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use uvflash::{ReadRequest, WriteReply, WriteRequest};

    #[test]
    fn test_describe_read_request() {
        let frame = ReadRequest::new(0x1000, 8, 0x1234).encode();
        let text = describe(&Message::decode(&frame).unwrap());
        assert!(text.contains("flash read request"));
        assert!(text.contains("0x001000"));
        assert!(text.contains("0x00001234"));
    }

    #[test]
    fn test_describe_incomplete_write() {
        let data = [0u8; 16];
        let frame = WriteRequest::new(0, &data, 1).unwrap().encode();
        let text = describe(&Message::decode(&frame[..20]).unwrap());
        assert!(text.contains("only 4 of 16"));
    }

    #[test]
    fn test_describe_write_reply() {
        let frame = WriteReply {
            address: 0x10,
            status: WriteStatus::Error,
        }
        .encode();
        let text = describe(&Message::decode(&frame).unwrap());
        assert!(text.contains("1 (error)"));
    }

    #[test]
    fn test_decode_unknown_id_fails() {
        assert!(cmd_decode(&[0x14, 0x05, 0x00, 0x00], false).is_err());
    }

    #[test]
    fn test_message_json_shape() {
        let frame = ReadRequest::new(16, 8, 2).encode();
        let message = Message::decode(&frame).unwrap();
        let value: serde_json::Value = serde_json::to_value(&message).unwrap();
        assert_eq!(value["kind"], "read_request");
        assert_eq!(value["address"], 16);
        assert_eq!(value["size"], 8);
    }
}
