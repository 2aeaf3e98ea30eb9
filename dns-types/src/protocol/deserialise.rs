//! Deserialisation of DNS messages from the network.  See the `types`
//! module for details of the format.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::protocol::types::*;

impl Message {
    pub fn from_octets(octets: &[u8]) -> Result<Self, Error> {
        Self::deserialise(&mut ConsumableBuffer::new(octets))
    }

    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let wire_header = WireHeader::deserialise(buffer)?;
        let mut questions = Vec::with_capacity(wire_header.qdcount.into());
        let mut answers = Vec::with_capacity(wire_header.ancount.into());
        let mut authority = Vec::with_capacity(wire_header.nscount.into());
        let mut additional = Vec::with_capacity(wire_header.arcount.into());

        for _ in 0..wire_header.qdcount {
            questions.push(Question::deserialise(wire_header.header.id, buffer)?);
        }
        for _ in 0..wire_header.ancount {
            answers.push(ResourceRecord::deserialise(wire_header.header.id, buffer)?);
        }
        for _ in 0..wire_header.nscount {
            authority.push(ResourceRecord::deserialise(wire_header.header.id, buffer)?);
        }
        for _ in 0..wire_header.arcount {
            additional.push(ResourceRecord::deserialise(wire_header.header.id, buffer)?);
        }

        Ok(Self {
            header: wire_header.header,
            questions,
            answers,
            authority,
            additional,
        })
    }
}

impl WireHeader {
    pub fn deserialise(buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let id = buffer.next_u16().ok_or(Error::CompletelyBusted)?;
        let flags1 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
        let flags2 = buffer.next_u8().ok_or(Error::HeaderTooShort(id))?;
        let qdcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let ancount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let nscount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;
        let arcount = buffer.next_u16().ok_or(Error::HeaderTooShort(id))?;

        Ok(Self {
            header: Header {
                id,
                is_response: flags1 & HEADER_MASK_QR != 0,
                opcode: Opcode::from((flags1 & HEADER_MASK_OPCODE) >> HEADER_OFFSET_OPCODE),
                is_authoritative: flags1 & HEADER_MASK_AA != 0,
                is_truncated: flags1 & HEADER_MASK_TC != 0,
                recursion_desired: flags1 & HEADER_MASK_RD != 0,
                recursion_available: flags2 & HEADER_MASK_RA != 0,
                rcode: Rcode::from((flags2 & HEADER_MASK_RCODE) >> HEADER_OFFSET_RCODE),
            },
            qdcount,
            ancount,
            nscount,
            arcount,
        })
    }
}

impl Question {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(id, buffer)?;
        let qtype = QueryType::deserialise(id, buffer)?;
        let qclass = QueryClass::deserialise(id, buffer)?;

        Ok(Self {
            name,
            qtype,
            qclass,
        })
    }
}

impl ResourceRecord {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let name = DomainName::deserialise(id, buffer)?;
        let rtype = RecordType::deserialise(id, buffer)?;
        let rclass = RecordClass::deserialise(id, buffer)?;
        // RFC 1035 section 4.1.3: TTL is a 32 bit field.
        let ttl = buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?;
        let rdlength = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;

        let rdata_start = buffer.position();

        let mut raw_rdata = || {
            buffer
                .take(rdlength as usize)
                .map(<[u8]>::to_vec)
                .ok_or(Error::ResourceRecordTooShort(id))
        };

        // records which embed a domain name are deserialised through
        // DomainName::deserialise so that compression pointers are
        // expanded; everything else is kept as opaque RDATA.
        let rtype_with_data = match rtype {
            RecordType::A => RecordTypeWithData::A {
                address: Ipv4Addr::from(
                    buffer.next_u32().ok_or(Error::ResourceRecordTooShort(id))?,
                ),
            },
            RecordType::NS => RecordTypeWithData::NS {
                nsdname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::CNAME => RecordTypeWithData::CNAME {
                cname: DomainName::deserialise(id, buffer)?,
            },
            RecordType::AAAA => RecordTypeWithData::AAAA {
                address: Ipv6Addr::new(
                    buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                    buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                    buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                    buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                    buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                    buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                    buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                    buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?,
                ),
            },
            RecordType::SOA => RecordTypeWithData::SOA {
                octets: raw_rdata()?,
            },
            RecordType::Unknown(tag) => RecordTypeWithData::Unknown {
                tag,
                octets: raw_rdata()?,
            },
        };

        let rdata_stop = buffer.position();

        if rdata_stop == rdata_start + (rdlength as usize) {
            Ok(Self {
                name,
                rtype_with_data,
                rclass,
                ttl,
            })
        } else {
            Err(Error::ResourceRecordInvalid(id))
        }
    }
}

impl DomainName {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        Self::deserialise_bounded(id, buffer, DOMAINNAME_MAX_POINTER_HOPS)
    }

    fn deserialise_bounded(
        id: u16,
        buffer: &mut ConsumableBuffer,
        hops_remaining: usize,
    ) -> Result<Self, Error> {
        let mut octets = Vec::<u8>::with_capacity(DOMAINNAME_MAX_LEN);
        let mut labels = Vec::<Vec<u8>>::with_capacity(5);
        let start = buffer.position();

        loop {
            let size = buffer.next_u8().ok_or(Error::DomainTooShort(id))?;

            if usize::from(size) <= LABEL_MAX_LEN {
                octets.push(size);

                if size == 0 {
                    labels.push(Vec::new());
                    break;
                }

                if let Some(os) = buffer.take(size as usize) {
                    octets.extend_from_slice(os);
                    labels.push(os.to_ascii_lowercase());
                    // keep the octets buffer lowercase too, for consistent hashing/equality
                    let start_of_label = octets.len() - os.len();
                    octets[start_of_label..].make_ascii_lowercase();
                } else {
                    return Err(Error::DomainTooShort(id));
                }

                if octets.len() > DOMAINNAME_MAX_LEN {
                    break;
                }
            } else if size >= 192 {
                if hops_remaining == 0 {
                    return Err(Error::DomainPointerInvalid(id));
                }

                let hi = size & 0b0011_1111;
                let lo = buffer.next_u8().ok_or(Error::DomainTooShort(id))?;
                let ptr = usize::from(u16::from_be_bytes([hi, lo]));

                // pointer must reference strictly earlier data (RFC
                // 1035 section 4.1.4); this both rules out
                // self-references and guarantees termination, since
                // every hop strictly shrinks the remaining search
                // space. The hop counter above is an additional,
                // independent bound.
                if ptr >= start {
                    return Err(Error::DomainPointerInvalid(id));
                }

                let mut pointed_at = buffer.at_offset(ptr);
                let mut other = DomainName::deserialise_bounded(id, &mut pointed_at, hops_remaining - 1)?;
                octets.append(&mut other.octets);
                labels.append(&mut other.labels);
                break;
            } else {
                return Err(Error::DomainLabelInvalid(id));
            }
        }

        if octets.len() <= DOMAINNAME_MAX_LEN {
            Ok(DomainName { octets, labels })
        } else {
            Err(Error::DomainTooLong(id))
        }
    }
}

impl QueryType {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::QuestionTooShort(id))?;
        Ok(Self::from(value))
    }
}

impl QueryClass {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::QuestionTooShort(id))?;
        Ok(Self::from(value))
    }
}

impl RecordType {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
        Ok(Self::from(value))
    }
}

impl RecordClass {
    pub fn deserialise(id: u16, buffer: &mut ConsumableBuffer) -> Result<Self, Error> {
        let value = buffer.next_u16().ok_or(Error::ResourceRecordTooShort(id))?;
        Ok(Self::from(value))
    }
}

/// Errors encountered when parsing a datagram.  Where a `u16` is
/// present, it's the ID from the header, so a caller could in
/// principle still correlate the failure with the request that caused
/// it.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// The datagram is not even 2 octets long, so it doesn't contain a
    /// valid ID.
    CompletelyBusted,
    /// The header is missing one or more required fields.
    HeaderTooShort(u16),
    /// A question ends with an incomplete field.
    QuestionTooShort(u16),
    /// A resource record ends with an incomplete field.
    ResourceRecordTooShort(u16),
    /// A resource record's RDATA did not consume exactly RDLENGTH octets.
    ResourceRecordInvalid(u16),
    /// A domain is incomplete.
    DomainTooShort(u16),
    /// A domain is over 255 octets in size.
    DomainTooLong(u16),
    /// A domain pointer points at or after the current record, or the
    /// pointer-hop budget was exhausted.
    DomainPointerInvalid(u16),
    /// A domain label is longer than 63 octets, but not a pointer.
    DomainLabelInvalid(u16),
}

impl Error {
    pub fn id(self) -> Option<u16> {
        match self {
            Error::CompletelyBusted => None,
            Error::HeaderTooShort(id)
            | Error::QuestionTooShort(id)
            | Error::ResourceRecordTooShort(id)
            | Error::ResourceRecordInvalid(id)
            | Error::DomainTooShort(id)
            | Error::DomainTooLong(id)
            | Error::DomainPointerInvalid(id)
            | Error::DomainLabelInvalid(id) => Some(id),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::CompletelyBusted => write!(f, "datagram too short to contain a header ID"),
            Error::HeaderTooShort(id) => write!(f, "header too short (id {id})"),
            Error::QuestionTooShort(id) => write!(f, "question too short (id {id})"),
            Error::ResourceRecordTooShort(id) => write!(f, "resource record too short (id {id})"),
            Error::ResourceRecordInvalid(id) => {
                write!(f, "resource record RDATA length mismatch (id {id})")
            }
            Error::DomainTooShort(id) => write!(f, "domain name truncated (id {id})"),
            Error::DomainTooLong(id) => write!(f, "domain name over 255 octets (id {id})"),
            Error::DomainPointerInvalid(id) => {
                write!(f, "invalid or runaway compression pointer (id {id})")
            }
            Error::DomainLabelInvalid(id) => write!(f, "invalid domain label (id {id})"),
        }
    }
}

impl std::error::Error for Error {}

/// A buffer which is consumed by the parsing process.  Cloning a
/// repositioned copy (`at_offset`) is how compression pointers are
/// followed without disturbing the caller's own position.
pub struct ConsumableBuffer<'a> {
    octets: &'a [u8],
    position: usize,
}

impl<'a> ConsumableBuffer<'a> {
    pub fn new(octets: &'a [u8]) -> Self {
        Self {
            octets,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn next_u8(&mut self) -> Option<u8> {
        let a = *self.octets.get(self.position)?;
        self.position += 1;
        Some(a)
    }

    pub fn next_u16(&mut self) -> Option<u16> {
        let bytes = self.octets.get(self.position..self.position + 2)?;
        self.position += 2;
        Some(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn next_u32(&mut self) -> Option<u32> {
        let bytes = self.octets.get(self.position..self.position + 4)?;
        self.position += 4;
        Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn take(&mut self, size: usize) -> Option<&'a [u8]> {
        let slice = self.octets.get(self.position..self.position + size)?;
        self.position += size;
        Some(slice)
    }

    pub fn at_offset(&self, position: usize) -> ConsumableBuffer<'a> {
        Self {
            octets: self.octets,
            position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::test_util::*;
    use std::net::Ipv4Addr;

    #[test]
    fn header_flags_round_trip() {
        let request = Message::from_question(
            0xBEEF,
            Question {
                name: domain("example.com."),
                qtype: QueryType::Record(RecordType::A),
                qclass: QueryClass::Record(RecordClass::IN),
            },
        );
        let mut response = request.make_response();
        response.header.is_authoritative = true;
        response.header.rcode = Rcode::NameError;

        let octets = response.clone().into_octets().unwrap();
        let decoded = Message::from_octets(&octets).unwrap();
        assert_eq!(response.header, decoded.header);
    }

    #[test]
    fn resource_record_ttl_is_four_octets() {
        let mut buf = WritableBuffer::default();
        let rr = a_record("example.com.", Ipv4Addr::new(93, 184, 216, 34));
        rr.clone().serialise(&mut buf).unwrap();

        let mut reader = ConsumableBuffer::new(&buf.octets);
        let decoded = ResourceRecord::deserialise(1, &mut reader).unwrap();
        assert_eq!(300, decoded.ttl);
        assert_eq!(buf.octets.len(), reader.position());
    }

    #[test]
    fn label_compression_pointer_is_followed() {
        // message: question "ns1.example.com" then an answer whose
        // name is a pointer back to that question's name.
        let mut buf = WritableBuffer::default();
        let name = domain("ns1.example.com.");
        name.clone().serialise(&mut buf);
        let pointer_target = 0usize;

        // now write a pointer octet pair in place of a second name
        buf.write_u8(0b1100_0000 | ((pointer_target >> 8) as u8));
        buf.write_u8((pointer_target & 0xFF) as u8);

        let mut reader = ConsumableBuffer::new(&buf.octets);
        let decoded = DomainName::deserialise(1, &mut reader).unwrap();
        assert_eq!("ns1.example.com", decoded.to_dotted_string());

        let decoded2 = DomainName::deserialise(1, &mut reader).unwrap();
        assert_eq!("ns1.example.com", decoded2.to_dotted_string());
    }

    #[test]
    fn label_compression_pointer_must_point_backwards() {
        let mut buf = WritableBuffer::default();
        // a name at offset 0 that points forward to offset 4, which
        // does not exist yet - must be rejected.
        buf.write_u8(0b1100_0000);
        buf.write_u8(0x04);

        let mut reader = ConsumableBuffer::new(&buf.octets);
        let err = DomainName::deserialise(1, &mut reader).unwrap_err();
        assert_eq!(Error::DomainPointerInvalid(1), err);
    }

    #[test]
    fn question_count_invariant() {
        let request = Message::from_question(
            42,
            Question {
                name: domain("example.com."),
                qtype: QueryType::Record(RecordType::A),
                qclass: QueryClass::Record(RecordClass::IN),
            },
        );
        let octets = request.into_octets().unwrap();
        let decoded = Message::from_octets(&octets).unwrap();
        assert_eq!(1, decoded.questions.len());
        assert_eq!(0, decoded.answers.len());
        assert_eq!(0, decoded.authority.len());
        assert_eq!(0, decoded.additional.len());
    }
}
