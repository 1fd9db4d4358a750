//! CBOR record shapes exchanged between storage node clients and servers,
//! and the length-prefixed framing used to put them on a byte stream.
//!
//! A fixed-width header (byte length, big-endian u32) precedes every
//! payload, same idea as any length-prefixed framing, just with a CBOR
//! payload instead of a custom binary layout.
//!
//! Every tag (`Action`, `Code`, `InfoType`) is encoded as its bare `u8`
//! discriminant, and every record is encoded as a fixed-length CBOR array
//! in field-declaration order, not a map keyed by field name. A peer
//! written in another language only has to agree on tag numbers and field
//! order, not on Rust identifiers.

use common::ClusterError;
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::ser::{SerializeTuple, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Read, Write};

/// Action tag for a `Request`. Numeric values are part of the wire contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Action {
    Put = 1,
    Delete = 2,
    Get = 3,
    GetSize = 4,
    Has = 5,
    Query = 6,
    TouchFile = 7,
    FileInfo = 8,
    DeleteFile = 9,
    ListFiles = 10,
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(Action::Put),
            2 => Ok(Action::Delete),
            3 => Ok(Action::Get),
            4 => Ok(Action::GetSize),
            5 => Ok(Action::Has),
            6 => Ok(Action::Query),
            7 => Ok(Action::TouchFile),
            8 => Ok(Action::FileInfo),
            9 => Ok(Action::DeleteFile),
            10 => Ok(Action::ListFiles),
            other => Err(de::Error::custom(format!("unknown action tag {other}"))),
        }
    }
}

/// Error/status tag carried on every `Reply` and `QueryEntry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Code {
    None = 0,
    NotFound = 1,
    AuthFailed = 2,
    QueryEnd = 3,
    Other = 100,
}

impl Serialize for Code {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            0 => Ok(Code::None),
            1 => Ok(Code::NotFound),
            2 => Ok(Code::AuthFailed),
            3 => Ok(Code::QueryEnd),
            100 => Ok(Code::Other),
            other => Err(de::Error::custom(format!("unknown status code {other}"))),
        }
    }
}

/// Bootstrap-protocol request kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InfoType {
    InfoClusterNodes = 1,
    InfoIdentity = 2,
}

impl Serialize for InfoType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

impl<'de> Deserialize<'de> for InfoType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match u8::deserialize(deserializer)? {
            1 => Ok(InfoType::InfoClusterNodes),
            2 => Ok(InfoType::InfoIdentity),
            other => Err(de::Error::custom(format!("unknown info type tag {other}"))),
        }
    }
}

/// Implements tuple-array `Serialize`/`Deserialize` for a record struct, in
/// field-declaration order. Keeps the wire shape a fixed-length CBOR array
/// instead of serde's default field-keyed map.
macro_rules! tuple_record {
    ($name:ident, $len:literal, [$($field:ident),+ $(,)?]) => {
        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut tup = serializer.serialize_tuple($len)?;
                $(tup.serialize_element(&self.$field)?;)+
                tup.end()
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct RecordVisitor;

                impl<'de> Visitor<'de> for RecordVisitor {
                    type Value = $name;

                    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                        write!(f, "a {}-element {} tuple", $len, stringify!($name))
                    }

                    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<$name, A::Error> {
                        let mut index = 0usize;
                        $(
                            let $field = seq
                                .next_element()?
                                .ok_or_else(|| de::Error::invalid_length(index, &self))?;
                            #[allow(unused_assignments)]
                            { index += 1; }
                        )+
                        Ok($name { $($field),+ })
                    }
                }

                deserializer.deserialize_tuple($len, RecordVisitor)
            }
        }
    };
}

#[derive(Debug, Clone)]
pub struct Query {
    pub access_token: String,
    pub prefix: String,
    pub limit: i64,
    pub offset: i64,
    pub keys_only: bool,
}

tuple_record!(Query, 5, [access_token, prefix, limit, offset, keys_only]);

impl Default for Query {
    fn default() -> Self {
        Query {
            access_token: String::new(),
            prefix: String::new(),
            limit: -1,
            offset: 0,
            keys_only: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub access_token: String,
    pub key: String,
    pub value: Vec<u8>,
    pub query: Query,
    pub action: Action,
}

tuple_record!(Request, 5, [access_token, key, value, query, action]);

impl Request {
    pub fn point(action: Action, key: impl Into<String>) -> Self {
        Request {
            access_token: String::new(),
            key: key.into(),
            value: Vec::new(),
            query: Query::default(),
            action,
        }
    }

    pub fn with_value(mut self, value: Vec<u8>) -> Self {
        self.value = value;
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }

    pub fn query_request(query: Query) -> Self {
        Request {
            access_token: query.access_token.clone(),
            key: String::new(),
            value: Vec::new(),
            query,
            action: Action::Query,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub code: Code,
    pub msg: String,
    pub value: Vec<u8>,
    pub size: i64,
    pub exists: bool,
}

tuple_record!(Reply, 5, [code, msg, value, size, exists]);

impl Reply {
    pub fn ok() -> Self {
        Reply {
            code: Code::None,
            msg: String::new(),
            value: Vec::new(),
            size: 0,
            exists: false,
        }
    }

    pub fn error(code: Code, msg: impl Into<String>) -> Self {
        Reply {
            code,
            msg: msg.into(),
            value: Vec::new(),
            size: 0,
            exists: false,
        }
    }

    pub fn into_result(self, module: &str) -> Result<Reply, ClusterError> {
        match self.code {
            Code::None => Ok(self),
            Code::NotFound => Err(ClusterError::new_not_found(&self.msg, module)),
            Code::AuthFailed => Err(ClusterError::new_auth_failed(module)),
            Code::QueryEnd => Ok(self),
            Code::Other => Err(ClusterError::new_other(self.msg, module)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryEntry {
    pub code: Code,
    pub msg: String,
    pub key: String,
    pub value: Vec<u8>,
    pub size: i64,
}

tuple_record!(QueryEntry, 5, [code, msg, key, value, size]);

impl QueryEntry {
    pub fn end() -> Self {
        QueryEntry {
            code: Code::QueryEnd,
            msg: String::new(),
            key: String::new(),
            value: Vec::new(),
            size: 0,
        }
    }

    pub fn error(code: Code, msg: impl Into<String>) -> Self {
        QueryEntry {
            code,
            msg: msg.into(),
            key: String::new(),
            value: Vec::new(),
            size: 0,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(self.code, Code::QueryEnd)
    }
}

#[derive(Debug, Clone)]
pub struct ShareRequest {
    pub kind: InfoType,
    pub index: u32,
}

tuple_record!(ShareRequest, 2, [kind, index]);

#[derive(Debug, Clone)]
pub struct ShareReply {
    pub code: Code,
    pub msg: String,
    pub kind: InfoType,
    pub info: Vec<u8>,
}

tuple_record!(ShareReply, 4, [code, msg, kind, info]);

const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// Writes one length-prefixed CBOR frame: a big-endian u32 byte count
/// followed by that many CBOR-encoded bytes.
pub fn write_frame<T: Serialize, W: Write>(writer: &mut W, value: &T) -> Result<(), ClusterError> {
    let mut buf = Vec::new();
    cbor4ii::serde::to_writer(&mut buf, value)
        .map_err(|e| ClusterError::new_protocol(format!("cbor encode failed: {e}"), "wire"))?;
    let len = buf.len() as u32;
    writer
        .write_all(&len.to_be_bytes())
        .map_err(ClusterError::from)?;
    writer.write_all(&buf).map_err(ClusterError::from)?;
    writer.flush().map_err(ClusterError::from)?;
    Ok(())
}

/// Reads one length-prefixed CBOR frame and decodes it as `T`.
pub fn read_frame<T: for<'de> Deserialize<'de>, R: Read>(reader: &mut R) -> Result<T, ClusterError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).map_err(io_to_cluster)?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        return Err(ClusterError::new_protocol(
            format!("frame of {len} bytes exceeds the {MAX_FRAME_LEN} byte limit"),
            "wire",
        ));
    }
    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).map_err(io_to_cluster)?;
    cbor4ii::serde::from_slice(&buf)
        .map_err(|e| ClusterError::new_protocol(format!("cbor decode failed: {e}"), "wire"))
}

fn io_to_cluster(err: io::Error) -> ClusterError {
    ClusterError::from(err)
}
