//! 와이어 코덱 — 버스 메시지의 바이너리 프레이밍
//!
//! 버스를 통해 교환되는 메시지는 필드 번호가 고정된 바이너리
//! 형식(varint 키, 길이 구분 필드)으로 인코딩됩니다. 스키마:
//!
//! ```text
//! Sbom         { 1: Image (optional), 2: Host (optional), 3: url string }
//! Image        { 1: image string, 2: digest string }
//! Host         { 1: hostname string }
//! Connection   { 1: Workload source, 2: Workload destination, 3: host string }
//! Workload     { 1: id string, 2: WorkloadType, 3: map<string, Analyse> }
//! Analyse      { 1: repeated string results }
//! ```
//!
//! 디코더는 알 수 없는 필드를 건너뛰므로 스키마에 필드를 추가해도
//! 기존 소비자와 호환됩니다.

use bytes::{BufMut, BytesMut};

use crate::error::WireError;
use crate::types::{Analyse, Connection, Host, Image, Sbom, Workload, WorkloadType};

const WIRE_VARINT: u8 = 0;
const WIRE_I64: u8 = 1;
const WIRE_LEN: u8 = 2;
const WIRE_I32: u8 = 5;

/// 버스로 전송 가능한 메시지
///
/// 인코딩은 실패하지 않으며, 디코딩 실패는 호출자가 메시지를
/// 폐기하는 신호로 사용합니다.
pub trait WireMessage: Sized + Send + Sync + 'static {
    /// 메시지를 버퍼 끝에 인코딩합니다.
    fn encode(&self, buf: &mut BytesMut);

    /// 바이트에서 메시지를 디코딩합니다.
    fn decode(data: &[u8]) -> Result<Self, WireError>;

    /// 새 버퍼에 인코딩하여 반환합니다.
    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);
        buf.to_vec()
    }
}

// ─── 인코딩 헬퍼 ─────────────────────────────────────────────────────

fn put_varint(buf: &mut BytesMut, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;

        if value == 0 {
            buf.put_u8(byte);
            return;
        }

        buf.put_u8(byte | 0x80);
    }
}

fn put_key(buf: &mut BytesMut, field: u32, wire_type: u8) {
    put_varint(buf, (u64::from(field) << 3) | u64::from(wire_type));
}

/// 스칼라 문자열 필드 — 빈 문자열은 생략합니다.
fn put_str(buf: &mut BytesMut, field: u32, value: &str) {
    if value.is_empty() {
        return;
    }

    put_str_element(buf, field, value);
}

/// repeated 문자열 원소 — 빈 문자열도 인코딩합니다.
fn put_str_element(buf: &mut BytesMut, field: u32, value: &str) {
    put_key(buf, field, WIRE_LEN);
    put_varint(buf, value.len() as u64);
    buf.put_slice(value.as_bytes());
}

fn put_message(buf: &mut BytesMut, field: u32, encode: impl FnOnce(&mut BytesMut)) {
    let mut nested = BytesMut::new();
    encode(&mut nested);

    put_key(buf, field, WIRE_LEN);
    put_varint(buf, nested.len() as u64);
    buf.put_slice(&nested);
}

fn put_enum(buf: &mut BytesMut, field: u32, value: u64) {
    if value == 0 {
        return;
    }

    put_key(buf, field, WIRE_VARINT);
    put_varint(buf, value);
}

// ─── 디코딩 헬퍼 ─────────────────────────────────────────────────────

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn done(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn read_varint(&mut self) -> Result<u64, WireError> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        let start = self.pos;

        loop {
            let byte = *self
                .data
                .get(self.pos)
                .ok_or(WireError::Truncated { offset: start })?;
            self.pos += 1;

            if shift >= 64 {
                return Err(WireError::VarintOverflow { offset: start });
            }

            value |= u64::from(byte & 0x7f) << shift;

            if byte & 0x80 == 0 {
                return Ok(value);
            }

            shift += 7;
        }
    }

    fn read_key(&mut self) -> Result<(u32, u8), WireError> {
        let key = self.read_varint()?;
        Ok(((key >> 3) as u32, (key & 0x07) as u8))
    }

    fn read_len(&mut self) -> Result<&'a [u8], WireError> {
        let len = self.read_varint()? as usize;
        let start = self.pos;
        let end = start
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(WireError::Truncated { offset: start })?;

        self.pos = end;
        Ok(&self.data[start..end])
    }

    fn read_string(&mut self, field: u32) -> Result<String, WireError> {
        let bytes = self.read_len()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| WireError::InvalidUtf8 { field })
    }

    /// 알 수 없는 필드를 와이어 타입에 따라 건너뜁니다.
    fn skip(&mut self, field: u32, wire_type: u8) -> Result<(), WireError> {
        match wire_type {
            WIRE_VARINT => {
                self.read_varint()?;
            }
            WIRE_I64 => {
                self.advance(8)?;
            }
            WIRE_LEN => {
                self.read_len()?;
            }
            WIRE_I32 => {
                self.advance(4)?;
            }
            other => {
                return Err(WireError::UnexpectedWireType {
                    field,
                    wire_type: other,
                });
            }
        }

        Ok(())
    }

    fn advance(&mut self, len: usize) -> Result<(), WireError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(WireError::Truncated { offset: self.pos })?;

        self.pos = end;
        Ok(())
    }
}

// ─── 메시지 구현 ─────────────────────────────────────────────────────

impl WireMessage for Analyse {
    fn encode(&self, buf: &mut BytesMut) {
        for result in &self.results {
            put_str_element(buf, 1, result);
        }
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(data);
        let mut results = Vec::new();

        while !reader.done() {
            let (field, wire_type) = reader.read_key()?;

            match (field, wire_type) {
                (1, WIRE_LEN) => results.push(reader.read_string(1)?),
                _ => reader.skip(field, wire_type)?,
            }
        }

        Ok(Self { results })
    }
}

impl WireMessage for Workload {
    fn encode(&self, buf: &mut BytesMut) {
        put_str(buf, 1, &self.id);
        put_enum(buf, 2, self.workload_type.to_wire());

        // map<string, Analyse>는 {1: key, 2: value} 엔트리의 반복으로 인코딩
        for (name, analyse) in &self.results {
            put_message(buf, 3, |entry| {
                put_str_element(entry, 1, name);
                put_message(entry, 2, |value| analyse.encode(value));
            });
        }
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(data);
        let mut workload = Self::default();

        while !reader.done() {
            let (field, wire_type) = reader.read_key()?;

            match (field, wire_type) {
                (1, WIRE_LEN) => workload.id = reader.read_string(1)?,
                (2, WIRE_VARINT) => {
                    let value = reader.read_varint()?;
                    workload.workload_type = WorkloadType::from_wire(value).unwrap_or_default();
                }
                (3, WIRE_LEN) => {
                    let entry = reader.read_len()?;
                    let (name, analyse) = decode_result_entry(entry)?;
                    workload.results.insert(name, analyse);
                }
                _ => reader.skip(field, wire_type)?,
            }
        }

        Ok(workload)
    }
}

fn decode_result_entry(data: &[u8]) -> Result<(String, Analyse), WireError> {
    let mut reader = Reader::new(data);
    let mut name = String::new();
    let mut analyse = Analyse::default();

    while !reader.done() {
        let (field, wire_type) = reader.read_key()?;

        match (field, wire_type) {
            (1, WIRE_LEN) => name = reader.read_string(1)?,
            (2, WIRE_LEN) => analyse = Analyse::decode(reader.read_len()?)?,
            _ => reader.skip(field, wire_type)?,
        }
    }

    Ok((name, analyse))
}

impl WireMessage for Connection {
    fn encode(&self, buf: &mut BytesMut) {
        put_message(buf, 1, |nested| self.source.encode(nested));
        put_message(buf, 2, |nested| self.destination.encode(nested));
        put_str(buf, 3, &self.host);
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(data);
        let mut connection = Self::default();

        while !reader.done() {
            let (field, wire_type) = reader.read_key()?;

            match (field, wire_type) {
                (1, WIRE_LEN) => connection.source = Workload::decode(reader.read_len()?)?,
                (2, WIRE_LEN) => connection.destination = Workload::decode(reader.read_len()?)?,
                (3, WIRE_LEN) => connection.host = reader.read_string(3)?,
                _ => reader.skip(field, wire_type)?,
            }
        }

        Ok(connection)
    }
}

impl WireMessage for Image {
    fn encode(&self, buf: &mut BytesMut) {
        put_str(buf, 1, &self.image);
        put_str(buf, 2, &self.digest);
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(data);
        let mut image = Self::default();

        while !reader.done() {
            let (field, wire_type) = reader.read_key()?;

            match (field, wire_type) {
                (1, WIRE_LEN) => image.image = reader.read_string(1)?,
                (2, WIRE_LEN) => image.digest = reader.read_string(2)?,
                _ => reader.skip(field, wire_type)?,
            }
        }

        Ok(image)
    }
}

impl WireMessage for Host {
    fn encode(&self, buf: &mut BytesMut) {
        put_str(buf, 1, &self.hostname);
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(data);
        let mut host = Self::default();

        while !reader.done() {
            let (field, wire_type) = reader.read_key()?;

            match (field, wire_type) {
                (1, WIRE_LEN) => host.hostname = reader.read_string(1)?,
                _ => reader.skip(field, wire_type)?,
            }
        }

        Ok(host)
    }
}

impl WireMessage for Sbom {
    fn encode(&self, buf: &mut BytesMut) {
        if let Some(image) = &self.image {
            put_message(buf, 1, |nested| image.encode(nested));
        }

        if let Some(host) = &self.host {
            put_message(buf, 2, |nested| host.encode(nested));
        }

        put_str(buf, 3, &self.url);
    }

    fn decode(data: &[u8]) -> Result<Self, WireError> {
        let mut reader = Reader::new(data);
        let mut sbom = Self::default();

        while !reader.done() {
            let (field, wire_type) = reader.read_key()?;

            match (field, wire_type) {
                (1, WIRE_LEN) => sbom.image = Some(Image::decode(reader.read_len()?)?),
                (2, WIRE_LEN) => sbom.host = Some(Host::decode(reader.read_len()?)?),
                (3, WIRE_LEN) => sbom.url = reader.read_string(3)?,
                _ => reader.skip(field, wire_type)?,
            }
        }

        Ok(sbom)
    }
}
