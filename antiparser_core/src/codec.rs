use crate::error::AntiparserError;
use crate::integer::{FixedInt, IntWidth};
use crate::object::{ByteOrder, DataField, DataObject};
use rand::Rng;

/// Appends the wire form of `object` to `out`.
///
/// * Freeform string: `content + terminator`
/// * C string: `content + terminator + 0x00`
/// * Keyword string: `keyword + separator + content + terminator`
/// * Integer: two's complement at the declared width, in the object's byte order
///
/// On error nothing is written to `out`.
pub fn encode_object(object: &DataObject, out: &mut Vec<u8>) -> Result<(), AntiparserError> {
    match object {
        DataObject::Freeform(string) => {
            out.extend_from_slice(string.content());
            out.extend_from_slice(string.terminator().unwrap_or_default());
        }
        DataObject::CString(string) => {
            out.extend_from_slice(string.content());
            out.extend_from_slice(string.terminator().unwrap_or_default());
            out.push(0);
        }
        DataObject::Keyword(keyword) => {
            out.extend_from_slice(keyword.current_keyword());
            out.extend_from_slice(keyword.separator());
            out.extend_from_slice(keyword.content());
            out.extend_from_slice(keyword.terminator().unwrap_or_default());
        }
        DataObject::Int(int) => encode_int(int, out)?,
    }
    Ok(())
}

fn encode_int(int: &FixedInt, out: &mut Vec<u8>) -> Result<(), AntiparserError> {
    let value = int.content();
    let (min, max) = int.value_range();
    if value < min || value > max {
        return Err(AntiparserError::Encoding {
            bits: int.width().bits(),
            signedness: if int.signed() { "signed" } else { "unsigned" },
            value,
            min,
            max,
        });
    }
    // In range, so truncating to the width yields the exact two's complement form.
    let order = int.byte_order();
    match int.width() {
        IntWidth::Bits8 => out.push(value as u8),
        IntWidth::Bits16 => {
            let raw = value as u16;
            out.extend_from_slice(&match order {
                ByteOrder::Native => raw.to_ne_bytes(),
                ByteOrder::Big => raw.to_be_bytes(),
                ByteOrder::Little => raw.to_le_bytes(),
            });
        }
        IntWidth::Bits32 => {
            let raw = value as u32;
            out.extend_from_slice(&match order {
                ByteOrder::Native => raw.to_ne_bytes(),
                ByteOrder::Big => raw.to_be_bytes(),
                ByteOrder::Little => raw.to_le_bytes(),
            });
        }
    }
    Ok(())
}

/// Serializes `objects` in order into one buffer.
///
/// Every optional object gets a fresh fair coin flip and contributes nothing
/// when it loses. An empty sequence, or one where every object was skipped,
/// yields an empty buffer.
pub fn build_payload<'a, I, R>(objects: I, rng: &mut R) -> Result<Vec<u8>, AntiparserError>
where
    I: IntoIterator<Item = &'a DataObject>,
    R: Rng + ?Sized,
{
    let mut payload = Vec::new();
    for object in objects {
        if object.optional() && !rng.random_bool(0.5) {
            continue;
        }
        encode_object(object, &mut payload)?;
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::{FreeformString, KeywordString};
    use rand_chacha::ChaCha8Rng;
    use rand_core::SeedableRng;

    fn encode(object: impl Into<DataObject>) -> Result<Vec<u8>, AntiparserError> {
        let mut out = Vec::new();
        encode_object(&object.into(), &mut out)?;
        Ok(out)
    }

    fn int_with(width: IntWidth, signed: bool, order: ByteOrder, value: i64) -> FixedInt {
        let mut int = FixedInt::new(width);
        int.set_signed(signed);
        int.set_byte_order(order);
        int.set_content(value);
        int
    }

    #[test]
    fn freeform_string_appends_terminator_when_set() {
        let mut string = FreeformString::with_content("abc");
        assert_eq!(encode(string.clone()).unwrap(), b"abc");
        string.set_terminator("\r\n");
        assert_eq!(encode(string).unwrap(), b"abc\r\n");
    }

    #[test]
    fn cstring_always_ends_with_exactly_one_null() {
        let mut string = FreeformString::with_content("abc");
        assert_eq!(encode(DataObject::cstring(string.clone())).unwrap(), b"abc\x00");

        string.set_terminator("\r\n");
        assert_eq!(
            encode(DataObject::cstring(string.clone())).unwrap(),
            b"abc\r\n\x00"
        );

        string.set_content("");
        string.clear_terminator();
        assert_eq!(encode(DataObject::cstring(string)).unwrap(), b"\x00");
    }

    #[test]
    fn keyword_string_concatenates_in_order() {
        let mut keyword = KeywordString::new(["USER"]).unwrap();
        keyword.set_separator(" ");
        keyword.set_content("root");
        assert_eq!(encode(keyword.clone()).unwrap(), b"USER root");

        keyword.set_terminator("\r\n");
        assert_eq!(encode(keyword).unwrap(), b"USER root\r\n");
    }

    #[test]
    fn integers_honor_width_and_byte_order() {
        assert_eq!(
            encode(int_with(IntWidth::Bits8, false, ByteOrder::Big, 0xAB)).unwrap(),
            vec![0xAB]
        );
        assert_eq!(
            encode(int_with(IntWidth::Bits16, false, ByteOrder::Big, 0x1234)).unwrap(),
            vec![0x12, 0x34]
        );
        assert_eq!(
            encode(int_with(IntWidth::Bits16, false, ByteOrder::Little, 0x1234)).unwrap(),
            vec![0x34, 0x12]
        );
        assert_eq!(
            encode(int_with(IntWidth::Bits32, false, ByteOrder::Big, 0xDEAD_BEEF)).unwrap(),
            vec![0xDE, 0xAD, 0xBE, 0xEF]
        );
        assert_eq!(
            encode(int_with(IntWidth::Bits32, false, ByteOrder::Native, 7)).unwrap(),
            7u32.to_ne_bytes().to_vec()
        );
    }

    #[test]
    fn signed_integers_use_twos_complement() {
        assert_eq!(
            encode(int_with(IntWidth::Bits8, true, ByteOrder::Big, -1)).unwrap(),
            vec![0xFF]
        );
        assert_eq!(
            encode(int_with(IntWidth::Bits16, true, ByteOrder::Big, -2)).unwrap(),
            vec![0xFF, 0xFE]
        );
        assert_eq!(
            encode(int_with(IntWidth::Bits32, true, ByteOrder::Little, i32::MIN as i64)).unwrap(),
            vec![0x00, 0x00, 0x00, 0x80]
        );
    }

    #[test]
    fn out_of_range_integers_fail_without_writing() {
        let mut out = vec![1, 2, 3];
        let too_big = DataObject::from(int_with(IntWidth::Bits8, false, ByteOrder::Big, 256));
        let err = encode_object(&too_big, &mut out).unwrap_err();
        assert_eq!(
            err,
            AntiparserError::Encoding {
                bits: 8,
                signedness: "unsigned",
                value: 256,
                min: 0,
                max: 255,
            }
        );
        assert_eq!(out, vec![1, 2, 3]);

        let negative_unsigned = int_with(IntWidth::Bits16, false, ByteOrder::Big, -1);
        assert!(encode(negative_unsigned).is_err());
        let too_small_signed = int_with(IntWidth::Bits8, true, ByteOrder::Big, -129);
        assert!(encode(too_small_signed).is_err());
    }

    #[test]
    fn empty_sequence_builds_empty_payload() {
        let mut rng = ChaCha8Rng::from_seed([0u8; 32]);
        let objects: Vec<DataObject> = Vec::new();
        assert!(build_payload(&objects, &mut rng).unwrap().is_empty());
    }

    #[test]
    fn optional_objects_are_included_about_half_the_time() {
        let mut rng = ChaCha8Rng::from_seed([3u8; 32]);
        let mut string = FreeformString::with_content("X");
        string.set_optional(true);
        let objects = vec![DataObject::from(string)];

        let rounds = 1000;
        let omitted = (0..rounds)
            .filter(|_| build_payload(&objects, &mut rng).unwrap().is_empty())
            .count();
        assert!(
            (400..=600).contains(&omitted),
            "omitted {omitted} of {rounds} builds"
        );
    }

    #[test]
    fn payload_concatenates_in_sequence_order() {
        let mut rng = ChaCha8Rng::from_seed([4u8; 32]);
        let mut verb = KeywordString::new(["GET"]).unwrap();
        verb.set_separator(" ");
        verb.set_content("/");
        verb.set_terminator("\r\n");
        let objects = vec![
            DataObject::from(verb),
            DataObject::from(int_with(IntWidth::Bits16, false, ByteOrder::Big, 0x0102)),
            DataObject::cstring(FreeformString::with_content("end")),
        ];
        assert_eq!(
            build_payload(&objects, &mut rng).unwrap(),
            b"GET /\r\n\x01\x02end\x00".to_vec()
        );
    }
}
