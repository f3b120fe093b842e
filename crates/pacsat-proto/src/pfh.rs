//! PACSAT File Header (PFH): the self-describing, CRC-checked TLV record
//! that precedes every stored file body.
//!
//! Wire layout: `MAGIC(0xAA 0x55) ‖ CRC16_LE(items_blob) ‖ items_blob`. Each
//! item in `items_blob` is `id:u8 ‖ len:u16 LE ‖ payload`, terminated by
//! three zero bytes (`id=0, len=0`). The CRC covers `items_blob` including
//! the terminator.
//!
//! Item-length width is canonicalized here as `u8` id + `u16 LE` len,
//! matching the tabulated wire format. The original C reference this was
//! distilled from wrote some items with a 16-bit id and an 8-bit len and
//! read them back with an 8-bit id and a 16-bit len — an internal
//! inconsistency this codec does not reproduce.

use crate::crc16::crc16;
use crate::error::ProtocolError;

const MAGIC: [u8; 2] = [0xAA, 0x55];
const NAME_WIDTH: usize = 8;
const EXT_WIDTH: usize = 3;
const MAX_SERIALIZED: usize = 65_535;

const ITEM_FILE_NUMBER: u8 = 0x01;
const ITEM_NAME: u8 = 0x02;
const ITEM_EXT: u8 = 0x03;
const ITEM_FILE_TYPE: u8 = 0x04;
const ITEM_BODY_SIZE: u8 = 0x05;
const ITEM_CREATE_TIME: u8 = 0x07;
const ITEM_UPLOAD_TIME: u8 = 0x08;
const ITEM_SEU_FLAG: u8 = 0x09;
const ITEM_BODY_OFFSET: u8 = 0x0B;
const ITEM_COMPRESSION_TYPE: u8 = 0x0C;
const ITEM_DESCRIPTION: u8 = 0x0D;
const ITEM_DOWNLOAD_COUNT: u8 = 0x14;
const ITEM_PRIORITY: u8 = 0x15;
const ITEM_FORWARDING: u8 = 0x63;

/// A decoded PACSAT File Header.
///
/// `name` and `ext` are always stored in their canonical space-padded,
/// fixed-width form (8 and 3 bytes respectively) so that
/// `decode(encode(p)) == p` holds without a separate "trimmed" variant
/// silently diverging from the wire bytes. Use [`Pfh::trimmed_name`] to get
/// the base name with padding stripped (e.g. for deriving store subdirectory
/// prefixes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pfh {
    /// Assigned file number.
    pub file_number: u32,
    /// Base name, space-padded to 8 bytes.
    pub name: String,
    /// Extension, space-padded to 3 bytes.
    pub ext: String,
    /// File type byte.
    pub file_type: u8,
    /// Body size in bytes.
    pub body_size: u32,
    /// Creation time, epoch seconds.
    pub create_time: u32,
    /// Upload time, epoch seconds.
    pub upload_time: u32,
    /// SEU / status flags.
    pub seu_flag: u8,
    /// Offset from the start of the serialized PFH to the body.
    pub body_offset: u16,
    /// Compression type (0 = none). Omitted from the wire form when 0.
    pub compression_type: u8,
    /// Body description. Omitted from the wire form when empty.
    pub description: String,
    /// Download count. Omitted from the wire form when 0.
    pub download_count: u32,
    /// Priority. Omitted from the wire form when 0.
    pub priority: u8,
    /// Forwarding callsign list. Omitted from the wire form when empty.
    pub forwarding: Vec<String>,
}

impl Pfh {
    /// Builds a PFH from its mandatory fields, space-padding `name` and
    /// `ext` to their canonical widths.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidField`] if `name` is longer than 8
    /// bytes or `ext` is longer than 3 bytes.
    pub fn new(
        file_number: u32,
        name: &str,
        ext: &str,
        file_type: u8,
        body_size: u32,
        create_time: u32,
        upload_time: u32,
        seu_flag: u8,
        body_offset: u16,
    ) -> Result<Self, ProtocolError> {
        Ok(Self {
            file_number,
            name: pad_field(name, NAME_WIDTH, "name")?,
            ext: pad_field(ext, EXT_WIDTH, "ext")?,
            file_type,
            body_size,
            create_time,
            upload_time,
            seu_flag,
            body_offset,
            compression_type: 0,
            description: String::new(),
            download_count: 0,
            priority: 0,
            forwarding: Vec::new(),
        })
    }

    /// Sets the compression type.
    #[must_use]
    pub fn with_compression_type(mut self, compression_type: u8) -> Self {
        self.compression_type = compression_type;
        self
    }

    /// Sets the body description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the download count.
    #[must_use]
    pub fn with_download_count(mut self, download_count: u32) -> Self {
        self.download_count = download_count;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the forwarding callsign list.
    #[must_use]
    pub fn with_forwarding(mut self, forwarding: Vec<String>) -> Self {
        self.forwarding = forwarding;
        self
    }

    /// Base name with trailing padding spaces stripped.
    #[must_use]
    pub fn trimmed_name(&self) -> &str {
        self.name.trim_end()
    }

    /// Extension with trailing padding spaces stripped.
    #[must_use]
    pub fn trimmed_ext(&self) -> &str {
        self.ext.trim_end()
    }

    /// Encodes this header as `MAGIC ‖ CRC16 ‖ items_blob`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidField`] if any item payload exceeds
    /// 65535 bytes or the total serialized size exceeds 65535 bytes (the
    /// limit implied by `body_offset` being a `u16`).
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut items = Vec::new();
        write_item(&mut items, ITEM_FILE_NUMBER, &self.file_number.to_le_bytes())?;
        write_item(&mut items, ITEM_NAME, self.name.as_bytes())?;
        write_item(&mut items, ITEM_EXT, self.ext.as_bytes())?;
        write_item(&mut items, ITEM_FILE_TYPE, &[self.file_type])?;
        write_item(&mut items, ITEM_BODY_SIZE, &self.body_size.to_le_bytes())?;
        write_item(&mut items, ITEM_CREATE_TIME, &self.create_time.to_le_bytes())?;
        write_item(&mut items, ITEM_UPLOAD_TIME, &self.upload_time.to_le_bytes())?;
        write_item(&mut items, ITEM_SEU_FLAG, &[self.seu_flag])?;
        write_item(&mut items, ITEM_BODY_OFFSET, &self.body_offset.to_le_bytes())?;

        if self.compression_type != 0 {
            write_item(&mut items, ITEM_COMPRESSION_TYPE, &[self.compression_type])?;
        }
        if !self.description.is_empty() {
            write_item(&mut items, ITEM_DESCRIPTION, self.description.as_bytes())?;
        }
        if self.download_count > 0 {
            write_item(&mut items, ITEM_DOWNLOAD_COUNT, &self.download_count.to_le_bytes())?;
        }
        if self.priority > 0 {
            write_item(&mut items, ITEM_PRIORITY, &[self.priority])?;
        }
        if !self.forwarding.is_empty() {
            let joined = self.forwarding.join(";");
            write_item(&mut items, ITEM_FORWARDING, joined.as_bytes())?;
        }

        // Terminator: id=0, len=0.
        items.extend_from_slice(&[0, 0, 0]);

        let crc = crc16(&items);
        let mut out = Vec::with_capacity(4 + items.len());
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&items);

        if out.len() > MAX_SERIALIZED {
            return Err(ProtocolError::InvalidField(format!(
                "serialized PFH is {} bytes, exceeds {MAX_SERIALIZED}",
                out.len()
            )));
        }
        Ok(out)
    }

    /// Decodes a PFH from `bytes`.
    ///
    /// Unknown item identifiers are skipped over (their `len` bytes are
    /// consumed and discarded) so that forward-compatible headers round
    /// trip through an older decoder without corruption.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::BadMagic`], [`ProtocolError::BadChecksum`],
    /// [`ProtocolError::Truncated`], or [`ProtocolError::MalformedItem`].
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        if bytes.len() < 4 {
            return Err(ProtocolError::Truncated { offset: 0, needed: 4 - bytes.len() });
        }
        if bytes[0..2] != MAGIC {
            return Err(ProtocolError::BadMagic);
        }
        let expected_crc = u16::from_le_bytes([bytes[2], bytes[3]]);
        let items_blob = &bytes[4..];
        let computed_crc = crc16(items_blob);
        if computed_crc != expected_crc {
            return Err(ProtocolError::BadChecksum { expected: expected_crc, computed: computed_crc });
        }

        let mut file_number = None;
        let mut name = None;
        let mut ext = None;
        let mut file_type = None;
        let mut body_size = None;
        let mut create_time = None;
        let mut upload_time = None;
        let mut seu_flag = None;
        let mut body_offset = None;
        let mut compression_type = 0u8;
        let mut description = String::new();
        let mut download_count = 0u32;
        let mut priority = 0u8;
        let mut forwarding = Vec::new();

        let mut offset = 0usize;
        while offset + 3 <= items_blob.len() {
            let id = items_blob[offset];
            let len = u16::from_le_bytes([items_blob[offset + 1], items_blob[offset + 2]]) as usize;
            if id == 0 && len == 0 {
                break;
            }
            let payload_start = offset + 3;
            let payload_end = payload_start + len;
            if payload_end > items_blob.len() {
                return Err(ProtocolError::Truncated {
                    offset: payload_start,
                    needed: payload_end - items_blob.len(),
                });
            }
            let payload = &items_blob[payload_start..payload_end];

            match id {
                ITEM_FILE_NUMBER => file_number = Some(read_u32(payload, id)?),
                ITEM_NAME => name = Some(String::from_utf8_lossy(payload).into_owned()),
                ITEM_EXT => ext = Some(String::from_utf8_lossy(payload).into_owned()),
                ITEM_FILE_TYPE => file_type = Some(read_u8(payload, id)?),
                ITEM_BODY_SIZE => body_size = Some(read_u32(payload, id)?),
                ITEM_CREATE_TIME => create_time = Some(read_u32(payload, id)?),
                ITEM_UPLOAD_TIME => upload_time = Some(read_u32(payload, id)?),
                ITEM_SEU_FLAG => seu_flag = Some(read_u8(payload, id)?),
                ITEM_BODY_OFFSET => body_offset = Some(read_u16(payload, id)?),
                ITEM_COMPRESSION_TYPE => compression_type = read_u8(payload, id)?,
                ITEM_DESCRIPTION => description = String::from_utf8_lossy(payload).into_owned(),
                ITEM_DOWNLOAD_COUNT => download_count = read_u32(payload, id)?,
                ITEM_PRIORITY => priority = read_u8(payload, id)?,
                ITEM_FORWARDING => {
                    let joined = String::from_utf8_lossy(payload).into_owned();
                    forwarding = joined.split(';').map(str::to_string).collect();
                },
                // Unknown item: skip by advancing past its payload.
                _ => {},
            }

            offset = payload_end;
        }

        Ok(Self {
            file_number: file_number
                .ok_or_else(|| ProtocolError::MalformedItem("missing file number item".to_string()))?,
            name: name.ok_or_else(|| ProtocolError::MalformedItem("missing name item".to_string()))?,
            ext: ext.ok_or_else(|| ProtocolError::MalformedItem("missing ext item".to_string()))?,
            file_type: file_type
                .ok_or_else(|| ProtocolError::MalformedItem("missing file type item".to_string()))?,
            body_size: body_size
                .ok_or_else(|| ProtocolError::MalformedItem("missing body size item".to_string()))?,
            create_time: create_time
                .ok_or_else(|| ProtocolError::MalformedItem("missing create time item".to_string()))?,
            upload_time: upload_time
                .ok_or_else(|| ProtocolError::MalformedItem("missing upload time item".to_string()))?,
            seu_flag: seu_flag
                .ok_or_else(|| ProtocolError::MalformedItem("missing SEU flag item".to_string()))?,
            body_offset: body_offset
                .ok_or_else(|| ProtocolError::MalformedItem("missing body offset item".to_string()))?,
            compression_type,
            description,
            download_count,
            priority,
            forwarding,
        })
    }
}

fn pad_field(value: &str, width: usize, field: &str) -> Result<String, ProtocolError> {
    if value.len() > width {
        return Err(ProtocolError::InvalidField(format!(
            "{field} is {} bytes, exceeds the {width}-byte field width",
            value.len()
        )));
    }
    let mut padded = value.to_string();
    padded.push_str(&" ".repeat(width - value.len()));
    Ok(padded)
}

fn write_item(buf: &mut Vec<u8>, id: u8, payload: &[u8]) -> Result<(), ProtocolError> {
    let len: u16 = payload
        .len()
        .try_into()
        .map_err(|_| ProtocolError::InvalidField(format!("item {id:#04x} payload exceeds 65535 bytes")))?;
    buf.push(id);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(())
}

fn read_u8(payload: &[u8], id: u8) -> Result<u8, ProtocolError> {
    payload
        .first()
        .copied()
        .ok_or_else(|| ProtocolError::MalformedItem(format!("item {id:#04x} expected 1 byte, got 0")))
}

fn read_u16(payload: &[u8], id: u8) -> Result<u16, ProtocolError> {
    let bytes: [u8; 2] = payload
        .try_into()
        .map_err(|_| ProtocolError::MalformedItem(format!("item {id:#04x} expected 2 bytes, got {}", payload.len())))?;
    Ok(u16::from_le_bytes(bytes))
}

fn read_u32(payload: &[u8], id: u8) -> Result<u32, ProtocolError> {
    let bytes: [u8; 4] = payload
        .try_into()
        .map_err(|_| ProtocolError::MalformedItem(format!("item {id:#04x} expected 4 bytes, got {}", payload.len())))?;
    Ok(u32::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_pfh() -> Pfh {
        Pfh::new(1, "HI", "TXT", 0, 5, 1_735_689_600, 1_735_689_600, 0, 21).unwrap()
    }

    #[test]
    fn scenario_1_minimal_round_trip() {
        let pfh = sample_pfh();
        let encoded = pfh.encode().unwrap();
        assert_eq!(&encoded[0..2], &[0xAA, 0x55]);
        let crc = u16::from_le_bytes([encoded[2], encoded[3]]);
        assert_eq!(crc, crc16(&encoded[4..]));

        let decoded = Pfh::decode(&encoded).unwrap();
        assert_eq!(decoded, pfh);
    }

    #[test]
    fn name_padded_to_canonical_width() {
        let pfh = Pfh::new(1, "HI", "TXT", 0, 0, 0, 0, 0, 0).unwrap();
        assert_eq!(pfh.name, "HI      ");
        assert_eq!(pfh.ext, "TXT");
        assert_eq!(pfh.trimmed_name(), "HI");
    }

    #[test]
    fn name_too_long_is_rejected() {
        let err = Pfh::new(1, "WAYTOOLONGNAME", "TXT", 0, 0, 0, 0, 0, 0).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidField(_)));
    }

    #[test]
    fn optional_items_omitted_when_default() {
        let pfh = sample_pfh();
        let encoded = pfh.encode().unwrap();
        // Mandatory items only: 9 items * (3 header + payload) + 3 terminator + 4 prefix.
        let mandatory_payload_len = 4 + 8 + 3 + 1 + 4 + 4 + 4 + 1 + 2;
        let mandatory_item_count = 9;
        let expected_len = 4 + mandatory_payload_len + mandatory_item_count * 3 + 3;
        assert_eq!(encoded.len(), expected_len);
    }

    #[test]
    fn optional_items_present_when_set() {
        let pfh = sample_pfh()
            .with_compression_type(2)
            .with_description("a test file")
            .with_download_count(4)
            .with_priority(1)
            .with_forwarding(vec!["KE4AHR-1".to_string(), "G0K8KA-0".to_string()]);
        let encoded = pfh.encode().unwrap();
        let decoded = Pfh::decode(&encoded).unwrap();
        assert_eq!(decoded, pfh);
    }

    #[test]
    fn unknown_item_is_skipped_on_decode() {
        let pfh = sample_pfh();
        let encoded = pfh.encode().unwrap();
        // Splice an unknown item (id 0x7F, 2-byte payload) in before the terminator.
        let mut items_blob = encoded[4..].to_vec();
        let terminator_pos = items_blob.len() - 3;
        items_blob.splice(terminator_pos..terminator_pos, [0x7F, 0x02, 0x00, 0xAB, 0xCD]);
        let crc = crc16(&items_blob);
        let mut spliced = Vec::new();
        spliced.extend_from_slice(&[0xAA, 0x55]);
        spliced.extend_from_slice(&crc.to_le_bytes());
        spliced.extend_from_slice(&items_blob);

        let decoded = Pfh::decode(&spliced).unwrap();
        assert_eq!(decoded, pfh);
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut encoded = sample_pfh().encode().unwrap();
        encoded[0] = 0x00;
        assert_eq!(Pfh::decode(&encoded).unwrap_err(), ProtocolError::BadMagic);
    }

    #[test]
    fn corrupted_byte_is_rejected() {
        let mut encoded = sample_pfh().encode().unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0x01;
        assert!(matches!(
            Pfh::decode(&encoded).unwrap_err(),
            ProtocolError::BadChecksum { .. } | ProtocolError::MalformedItem(_) | ProtocolError::Truncated { .. }
        ));
    }

    #[test]
    fn truncated_input_is_rejected() {
        assert!(matches!(Pfh::decode(&[0xAA, 0x55]).unwrap_err(), ProtocolError::Truncated { .. }));
    }

    fn arb_pfh() -> impl Strategy<Item = Pfh> {
        (
            any::<u32>(),
            "[A-Z0-9]{0,8}",
            "[A-Z0-9]{0,3}",
            any::<u8>(),
            any::<u32>(),
            any::<u32>(),
            any::<u32>(),
            any::<u8>(),
            any::<u16>(),
            any::<u8>(),
            "[ -~]{0,40}",
            any::<u32>(),
            any::<u8>(),
        )
            .prop_map(
                |(
                    file_number,
                    name,
                    ext,
                    file_type,
                    body_size,
                    create_time,
                    upload_time,
                    seu_flag,
                    body_offset,
                    compression_type,
                    description,
                    download_count,
                    priority,
                )| {
                    Pfh::new(file_number, &name, &ext, file_type, body_size, create_time, upload_time, seu_flag, body_offset)
                        .unwrap()
                        .with_compression_type(compression_type)
                        .with_description(description)
                        .with_download_count(download_count)
                        .with_priority(priority)
                },
            )
    }

    proptest! {
        #[test]
        fn round_trip_holds_for_arbitrary_headers(pfh in arb_pfh()) {
            let encoded = pfh.encode().unwrap();
            let decoded = Pfh::decode(&encoded).unwrap();
            prop_assert_eq!(decoded, pfh);
        }

        #[test]
        fn decode_then_encode_is_stable(pfh in arb_pfh()) {
            let encoded = pfh.encode().unwrap();
            let decoded = Pfh::decode(&encoded).unwrap();
            let reencoded = decoded.encode().unwrap();
            prop_assert_eq!(reencoded, encoded);
        }
    }
}
