use crate::error::DecodeError;
use crate::models::MacroMetadata;

const TEXT_COMPACTION_MODE_LATCH: u16 = 900;
const BYTE_COMPACTION_MODE_LATCH: u16 = 901;
const NUMERIC_COMPACTION_MODE_LATCH: u16 = 902;
const BYTE_COMPACTION_MODE_LATCH_6: u16 = 924;
const ECI_USER_DEFINED: u16 = 925;
const ECI_GENERAL_PURPOSE: u16 = 926;
const ECI_CHARSET: u16 = 927;
const BEGIN_MACRO_PDF417_CONTROL_BLOCK: u16 = 928;
const BEGIN_MACRO_PDF417_OPTIONAL_FIELD: u16 = 923;
const MACRO_PDF417_TERMINATOR: u16 = 922;
const MODE_SHIFT_TO_BYTE_COMPACTION_MODE: u16 = 913;
const MAX_NUMERIC_CODEWORDS: usize = 15;
const NUMBER_OF_SEQUENCE_CODEWORDS: usize = 2;

const MACRO_FIELD_FILE_NAME: u16 = 0;
const MACRO_FIELD_SEGMENT_COUNT: u16 = 1;
const MACRO_FIELD_TIME_STAMP: u16 = 2;
const MACRO_FIELD_SENDER: u16 = 3;
const MACRO_FIELD_ADDRESSEE: u16 = 4;
const MACRO_FIELD_FILE_SIZE: u16 = 5;
const MACRO_FIELD_CHECKSUM: u16 = 6;

// text compaction sub-mode switch codes
const PL: u16 = 25;
const LL: u16 = 27;
const AS: u16 = 27;
const ML: u16 = 28;
const AL: u16 = 28;
const PS: u16 = 29;
const PAL: u16 = 29;

const PUNCT_CHARS: &[u8] = b";<>@[\\]_`~!\r\t,:\n-.$/\"|*()?{}'";
const MIXED_CHARS: &[u8] = b"0123456789&\r\t,:#-.$/+%*=^";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextSubMode {
    Alpha,
    Lower,
    Mixed,
    Punct,
    AlphaShift,
    PunctShift,
}

/// Interprets the corrected codeword stream as payload text via the
/// compaction-mode grammar. Byte compaction output is mapped through
/// Latin-1 into the result string.
pub struct BitstreamDecoder;

impl BitstreamDecoder {
    /// Decode `codewords` (index 0 holds the data codeword count, error
    /// correction codewords may trail) into payload text plus the optional
    /// Macro PDF417 control block.
    pub fn decode(codewords: &[u16]) -> Result<(String, Option<MacroMetadata>), DecodeError> {
        let length = codewords[0] as usize;
        let mut result = String::with_capacity(length * 2);
        let mut macro_metadata: Option<MacroMetadata> = None;

        let mut code_index = 1usize;
        let mut code = read(codewords, code_index)?;
        code_index += 1;
        while code_index < length {
            match code {
                TEXT_COMPACTION_MODE_LATCH => {
                    code_index = Self::text_compaction(codewords, code_index, &mut result)?;
                }
                BYTE_COMPACTION_MODE_LATCH | BYTE_COMPACTION_MODE_LATCH_6 => {
                    code_index = Self::byte_compaction(code, codewords, code_index, &mut result)?;
                }
                MODE_SHIFT_TO_BYTE_COMPACTION_MODE => {
                    push_latin1(&mut result, read(codewords, code_index)?);
                    code_index += 1;
                }
                NUMERIC_COMPACTION_MODE_LATCH => {
                    code_index = Self::numeric_compaction(codewords, code_index, &mut result)?;
                }
                ECI_CHARSET | ECI_USER_DEFINED => {
                    // charset switching is not supported; output stays Latin-1
                    code_index += 1;
                }
                ECI_GENERAL_PURPOSE => {
                    code_index += 2;
                }
                BEGIN_MACRO_PDF417_CONTROL_BLOCK => {
                    let (next_index, metadata) = Self::decode_macro_block(codewords, code_index)?;
                    code_index = next_index;
                    macro_metadata = Some(metadata);
                }
                BEGIN_MACRO_PDF417_OPTIONAL_FIELD | MACRO_PDF417_TERMINATOR => {
                    // never valid outside a macro block
                    return Err(DecodeError::InvalidFormat);
                }
                _ => {
                    // a symbol missing its leading latch is decoded as text
                    // compaction, which recovers most real-world cases
                    code_index -= 1;
                    code_index = Self::text_compaction(codewords, code_index, &mut result)?;
                }
            }
            if code_index < codewords.len() {
                code = codewords[code_index];
                code_index += 1;
            } else {
                return Err(DecodeError::InvalidFormat);
            }
        }
        if result.is_empty() && macro_metadata.is_none() {
            return Err(DecodeError::InvalidFormat);
        }
        Ok((result, macro_metadata))
    }

    /// Text compaction packs two 0..=29 values per codeword, interpreted
    /// through the sub-mode state machine.
    fn text_compaction(
        codewords: &[u16],
        mut code_index: usize,
        result: &mut String,
    ) -> Result<usize, DecodeError> {
        let length = codewords[0] as usize;
        let mut text_data: Vec<u16> = Vec::with_capacity((length - code_index.min(length)) * 2);
        let mut byte_data: Vec<u16> = Vec::new();

        let mut end = false;
        while code_index < length && !end {
            let code = read(codewords, code_index)?;
            code_index += 1;
            if code < TEXT_COMPACTION_MODE_LATCH {
                text_data.push(code / 30);
                byte_data.push(0);
                text_data.push(code % 30);
                byte_data.push(0);
            } else {
                match code {
                    TEXT_COMPACTION_MODE_LATCH => {
                        // re-latch inside text mode resets to Alpha
                        text_data.push(TEXT_COMPACTION_MODE_LATCH);
                        byte_data.push(0);
                    }
                    MODE_SHIFT_TO_BYTE_COMPACTION_MODE => {
                        // one raw byte, then back to the prevailing sub-mode
                        text_data.push(MODE_SHIFT_TO_BYTE_COMPACTION_MODE);
                        byte_data.push(read(codewords, code_index)?);
                        code_index += 1;
                    }
                    BYTE_COMPACTION_MODE_LATCH
                    | BYTE_COMPACTION_MODE_LATCH_6
                    | NUMERIC_COMPACTION_MODE_LATCH
                    | BEGIN_MACRO_PDF417_CONTROL_BLOCK
                    | BEGIN_MACRO_PDF417_OPTIONAL_FIELD
                    | MACRO_PDF417_TERMINATOR => {
                        code_index -= 1;
                        end = true;
                    }
                    _ => {}
                }
            }
        }
        Self::decode_text_data(&text_data, &byte_data, result);
        Ok(code_index)
    }

    fn decode_text_data(text_data: &[u16], byte_data: &[u16], result: &mut String) {
        let mut sub_mode = TextSubMode::Alpha;
        let mut prior_to_shift = TextSubMode::Alpha;
        for (i, &code) in text_data.iter().enumerate() {
            let mut ch: Option<char> = None;
            match sub_mode {
                TextSubMode::Alpha => {
                    if code < 26 {
                        ch = Some((b'A' + code as u8) as char);
                    } else {
                        match code {
                            26 => ch = Some(' '),
                            LL => sub_mode = TextSubMode::Lower,
                            ML => sub_mode = TextSubMode::Mixed,
                            PS => {
                                prior_to_shift = sub_mode;
                                sub_mode = TextSubMode::PunctShift;
                            }
                            MODE_SHIFT_TO_BYTE_COMPACTION_MODE => {
                                push_latin1(result, byte_data[i]);
                            }
                            TEXT_COMPACTION_MODE_LATCH => sub_mode = TextSubMode::Alpha,
                            _ => {}
                        }
                    }
                }
                TextSubMode::Lower => {
                    if code < 26 {
                        ch = Some((b'a' + code as u8) as char);
                    } else {
                        match code {
                            26 => ch = Some(' '),
                            AS => {
                                prior_to_shift = sub_mode;
                                sub_mode = TextSubMode::AlphaShift;
                            }
                            ML => sub_mode = TextSubMode::Mixed,
                            PS => {
                                prior_to_shift = sub_mode;
                                sub_mode = TextSubMode::PunctShift;
                            }
                            MODE_SHIFT_TO_BYTE_COMPACTION_MODE => {
                                push_latin1(result, byte_data[i]);
                            }
                            TEXT_COMPACTION_MODE_LATCH => sub_mode = TextSubMode::Alpha,
                            _ => {}
                        }
                    }
                }
                TextSubMode::Mixed => {
                    if code < PL {
                        ch = Some(MIXED_CHARS[code as usize] as char);
                    } else {
                        match code {
                            PL => sub_mode = TextSubMode::Punct,
                            26 => ch = Some(' '),
                            LL => sub_mode = TextSubMode::Lower,
                            AL => sub_mode = TextSubMode::Alpha,
                            PS => {
                                prior_to_shift = sub_mode;
                                sub_mode = TextSubMode::PunctShift;
                            }
                            MODE_SHIFT_TO_BYTE_COMPACTION_MODE => {
                                push_latin1(result, byte_data[i]);
                            }
                            TEXT_COMPACTION_MODE_LATCH => sub_mode = TextSubMode::Alpha,
                            _ => {}
                        }
                    }
                }
                TextSubMode::Punct => {
                    if code < PAL {
                        ch = Some(PUNCT_CHARS[code as usize] as char);
                    } else {
                        match code {
                            PAL => sub_mode = TextSubMode::Alpha,
                            MODE_SHIFT_TO_BYTE_COMPACTION_MODE => {
                                push_latin1(result, byte_data[i]);
                            }
                            TEXT_COMPACTION_MODE_LATCH => sub_mode = TextSubMode::Alpha,
                            _ => {}
                        }
                    }
                }
                TextSubMode::AlphaShift => {
                    sub_mode = prior_to_shift;
                    if code < 26 {
                        ch = Some((b'A' + code as u8) as char);
                    } else {
                        match code {
                            26 => ch = Some(' '),
                            TEXT_COMPACTION_MODE_LATCH => sub_mode = TextSubMode::Alpha,
                            _ => {}
                        }
                    }
                }
                TextSubMode::PunctShift => {
                    sub_mode = prior_to_shift;
                    if code < PAL {
                        ch = Some(PUNCT_CHARS[code as usize] as char);
                    } else {
                        match code {
                            PAL => sub_mode = TextSubMode::Alpha,
                            MODE_SHIFT_TO_BYTE_COMPACTION_MODE => {
                                // PS before a byte shift acts as padding
                                push_latin1(result, byte_data[i]);
                            }
                            TEXT_COMPACTION_MODE_LATCH => sub_mode = TextSubMode::Alpha,
                            _ => {}
                        }
                    }
                }
            }
            if let Some(ch) = ch {
                result.push(ch);
            }
        }
    }

    /// Byte compaction: groups of 5 codewords hold a base-900 value that
    /// expands to 6 bytes. Under latch 901 a short tail group is emitted as
    /// one raw byte per codeword; latch 924 promises whole groups only.
    fn byte_compaction(
        mode: u16,
        codewords: &[u16],
        mut code_index: usize,
        result: &mut String,
    ) -> Result<usize, DecodeError> {
        let length = codewords[0] as usize;
        let mut value: u64 = 0;
        let mut count = 0usize;
        let mut end = false;

        match mode {
            BYTE_COMPACTION_MODE_LATCH => {
                let mut group = [0u16; 6];
                let mut next_code = read(codewords, code_index)?;
                code_index += 1;
                while code_index < length && !end {
                    group[count] = next_code;
                    count += 1;
                    value = 900 * value + next_code as u64;
                    next_code = read(codewords, code_index)?;
                    code_index += 1;
                    match next_code {
                        TEXT_COMPACTION_MODE_LATCH
                        | BYTE_COMPACTION_MODE_LATCH
                        | NUMERIC_COMPACTION_MODE_LATCH
                        | BYTE_COMPACTION_MODE_LATCH_6
                        | BEGIN_MACRO_PDF417_CONTROL_BLOCK
                        | BEGIN_MACRO_PDF417_OPTIONAL_FIELD
                        | MACRO_PDF417_TERMINATOR => {
                            code_index -= 1;
                            end = true;
                        }
                        _ => {
                            if count % 5 == 0 && count > 0 {
                                for j in 0..6 {
                                    push_latin1(result, ((value >> (8 * (5 - j))) & 0xFF) as u16);
                                }
                                value = 0;
                                count = 0;
                            }
                        }
                    }
                }
                // the final codeword of the stream still belongs to the tail
                if code_index == length && next_code < TEXT_COMPACTION_MODE_LATCH {
                    group[count] = next_code;
                    count += 1;
                }
                // tail group: one byte per codeword, no compaction
                for &code in group.iter().take(count) {
                    push_latin1(result, code);
                }
            }
            _ => {
                // BYTE_COMPACTION_MODE_LATCH_6
                while code_index < length && !end {
                    let code = read(codewords, code_index)?;
                    code_index += 1;
                    if code < TEXT_COMPACTION_MODE_LATCH {
                        count += 1;
                        value = 900 * value + code as u64;
                    } else {
                        match code {
                            TEXT_COMPACTION_MODE_LATCH
                            | BYTE_COMPACTION_MODE_LATCH
                            | NUMERIC_COMPACTION_MODE_LATCH
                            | BYTE_COMPACTION_MODE_LATCH_6
                            | BEGIN_MACRO_PDF417_CONTROL_BLOCK
                            | BEGIN_MACRO_PDF417_OPTIONAL_FIELD
                            | MACRO_PDF417_TERMINATOR => {
                                code_index -= 1;
                                end = true;
                            }
                            _ => {}
                        }
                    }
                    if count % 5 == 0 && count > 0 {
                        for j in 0..6 {
                            push_latin1(result, ((value >> (8 * (5 - j))) & 0xFF) as u16);
                        }
                        value = 0;
                        count = 0;
                    }
                }
            }
        }
        Ok(code_index)
    }

    /// Numeric compaction: batches of up to 15 codewords form a base-900
    /// big integer whose decimal expansion carries an implicit leading 1.
    fn numeric_compaction(
        codewords: &[u16],
        mut code_index: usize,
        result: &mut String,
    ) -> Result<usize, DecodeError> {
        let length = codewords[0] as usize;
        let mut numeric_codewords = [0u16; MAX_NUMERIC_CODEWORDS];
        let mut count = 0usize;
        let mut end = false;

        while code_index < length && !end {
            let code = read(codewords, code_index)?;
            code_index += 1;
            if code_index == length {
                end = true;
            }
            if code < TEXT_COMPACTION_MODE_LATCH {
                numeric_codewords[count] = code;
                count += 1;
            } else {
                match code {
                    TEXT_COMPACTION_MODE_LATCH
                    | BYTE_COMPACTION_MODE_LATCH
                    | BYTE_COMPACTION_MODE_LATCH_6
                    | BEGIN_MACRO_PDF417_CONTROL_BLOCK
                    | BEGIN_MACRO_PDF417_OPTIONAL_FIELD
                    | MACRO_PDF417_TERMINATOR => {
                        code_index -= 1;
                        end = true;
                    }
                    _ => {}
                }
            }
            // a 902 re-latch terminates the current grouping early
            if (count % MAX_NUMERIC_CODEWORDS == 0 || code == NUMERIC_COMPACTION_MODE_LATCH || end)
                && count > 0
            {
                result.push_str(&Self::decode_base900_to_base10(
                    &numeric_codewords[..count],
                )?);
                count = 0;
            }
        }
        Ok(code_index)
    }

    /// Convert base-900 codewords to the decimal string they encode.
    /// The value always carries a leading 1 that protects leading zeros of
    /// the payload; its absence marks a corrupt stream.
    fn decode_base900_to_base10(codewords: &[u16]) -> Result<String, DecodeError> {
        // little-endian decimal digit accumulator; 15 codewords make a
        // 45-digit value, past any native integer
        let mut digits: Vec<u8> = vec![0];
        for &codeword in codewords {
            let mut carry = codeword as u32;
            for digit in digits.iter_mut() {
                let t = *digit as u32 * 900 + carry;
                *digit = (t % 10) as u8;
                carry = t / 10;
            }
            while carry > 0 {
                digits.push((carry % 10) as u8);
                carry /= 10;
            }
        }
        if digits.last() != Some(&1) {
            return Err(DecodeError::InvalidFormat);
        }
        Ok(digits[..digits.len() - 1]
            .iter()
            .rev()
            .map(|&d| (b'0' + d) as char)
            .collect())
    }

    /// Macro PDF417 control block: segment index, file id, optional fields.
    fn decode_macro_block(
        codewords: &[u16],
        mut code_index: usize,
    ) -> Result<(usize, MacroMetadata), DecodeError> {
        let length = codewords[0] as usize;
        if code_index + NUMBER_OF_SEQUENCE_CODEWORDS > length {
            return Err(DecodeError::InvalidFormat);
        }
        let mut segment_codes = [0u16; NUMBER_OF_SEQUENCE_CODEWORDS];
        for code in segment_codes.iter_mut() {
            *code = read(codewords, code_index)?;
            code_index += 1;
        }
        let segment_index = Self::decode_base900_to_base10(&segment_codes)?
            .parse::<u32>()
            .map_err(|_| DecodeError::InvalidFormat)?;

        let mut metadata = MacroMetadata {
            segment_index,
            ..MacroMetadata::default()
        };

        // the file id is a run of plain codewords, three digits each
        let mut file_id = String::new();
        while code_index < length
            && codewords[code_index] != MACRO_PDF417_TERMINATOR
            && codewords[code_index] != BEGIN_MACRO_PDF417_OPTIONAL_FIELD
        {
            file_id.push_str(&format!("{:03}", codewords[code_index]));
            code_index += 1;
        }
        if file_id.is_empty() {
            return Err(DecodeError::InvalidFormat);
        }
        metadata.file_id = file_id;

        while code_index < length {
            match codewords[code_index] {
                BEGIN_MACRO_PDF417_OPTIONAL_FIELD => {
                    code_index += 1;
                    let field = read(codewords, code_index)?;
                    code_index += 1;
                    match field {
                        MACRO_FIELD_FILE_NAME => {
                            let mut file_name = String::new();
                            code_index =
                                Self::text_compaction(codewords, code_index, &mut file_name)?;
                            metadata.file_name = Some(file_name);
                        }
                        MACRO_FIELD_SENDER => {
                            let mut sender = String::new();
                            code_index = Self::text_compaction(codewords, code_index, &mut sender)?;
                            metadata.sender = Some(sender);
                        }
                        MACRO_FIELD_ADDRESSEE => {
                            let mut addressee = String::new();
                            code_index =
                                Self::text_compaction(codewords, code_index, &mut addressee)?;
                            metadata.addressee = Some(addressee);
                        }
                        MACRO_FIELD_SEGMENT_COUNT => {
                            let mut count = String::new();
                            code_index =
                                Self::numeric_compaction(codewords, code_index, &mut count)?;
                            metadata.segment_count =
                                Some(count.parse().map_err(|_| DecodeError::InvalidFormat)?);
                        }
                        MACRO_FIELD_TIME_STAMP => {
                            let mut timestamp = String::new();
                            code_index =
                                Self::numeric_compaction(codewords, code_index, &mut timestamp)?;
                            metadata.timestamp =
                                Some(timestamp.parse().map_err(|_| DecodeError::InvalidFormat)?);
                        }
                        MACRO_FIELD_FILE_SIZE => {
                            let mut file_size = String::new();
                            code_index =
                                Self::numeric_compaction(codewords, code_index, &mut file_size)?;
                            metadata.file_size =
                                Some(file_size.parse().map_err(|_| DecodeError::InvalidFormat)?);
                        }
                        MACRO_FIELD_CHECKSUM => {
                            let mut checksum = String::new();
                            code_index =
                                Self::numeric_compaction(codewords, code_index, &mut checksum)?;
                            metadata.checksum =
                                Some(checksum.parse().map_err(|_| DecodeError::InvalidFormat)?);
                        }
                        _ => return Err(DecodeError::InvalidFormat),
                    }
                }
                MACRO_PDF417_TERMINATOR => {
                    code_index += 1;
                    metadata.is_last_segment = true;
                }
                _ => return Err(DecodeError::InvalidFormat),
            }
        }
        Ok((code_index, metadata))
    }
}

fn read(codewords: &[u16], index: usize) -> Result<u16, DecodeError> {
    codewords
        .get(index)
        .copied()
        .ok_or(DecodeError::InvalidFormat)
}

fn push_latin1(result: &mut String, code: u16) {
    if let Some(ch) = char::from_u32(code as u32) {
        result.push(ch);
    }
}
