//! POCSAG pager decoder (spec §4.D): bit slicing, sync search, BCH
//! correction, batch parsing, and message assembly.

mod bch;
mod payload;
mod slicer;

pub const POCSAG_IDLE: u32 = 0x7A89C197;
const BAUD_RATES: [u32; 3] = [512, 1200, 2400];
const MAX_HISTORY: usize = 200;
const DUPLICATE_WINDOW_SECS: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MsgType {
    Numeric,
    Alpha,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct PocsagMessage {
    pub address: u32,
    pub function: u8,
    pub content: String,
    pub msg_type: MsgType,
    pub baud: u32,
    pub timestamp: f64,
}

pub struct PocsagDecoder {
    sample_rate: f32,
    buffer: Vec<f32>,
    messages: std::collections::VecDeque<PocsagMessage>,
}

impl PocsagDecoder {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            buffer: Vec::new(),
            messages: std::collections::VecDeque::with_capacity(MAX_HISTORY),
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.messages.clear();
    }

    /// Feeds FM-demodulated audio into the decoder, appending new messages
    /// it decodes as a side effect.
    pub fn process_audio(&mut self, samples: &[f32], now: f64) {
        if samples.is_empty() {
            return;
        }
        self.buffer.extend_from_slice(samples);
        let max_samples = (self.sample_rate * 2.0) as usize;
        if self.buffer.len() > max_samples {
            let drop = self.buffer.len() - max_samples;
            self.buffer.drain(0..drop);
        }

        for baud in BAUD_RATES {
            let Some(bits) = slicer::slice_bits(&self.buffer, self.sample_rate, baud) else {
                continue;
            };
            for batch in slicer::find_batches(&bits).collect::<Vec<_>>() {
                self.decode_batch(batch, baud, now);
            }
        }
    }

    fn decode_batch(&mut self, bits: &[u8], baud: u32, now: f64) {
        let mut current_address: Option<u32> = None;
        let mut current_function: u8 = 0;
        let mut message_bits: Vec<u8> = Vec::new();

        for (i, mut codeword) in slicer::codewords(bits).enumerate() {
            let frame_idx = (i / 2) as u32;

            if codeword == POCSAG_IDLE {
                if let Some(addr) = current_address.take() {
                    if !message_bits.is_empty() {
                        self.emit(addr, current_function, &message_bits, baud, now);
                    }
                    message_bits.clear();
                }
                continue;
            }

            if !bch::check(codeword) {
                match bch::correct(codeword) {
                    Some(fixed) => codeword = fixed,
                    None => continue,
                }
            }

            let is_message = (codeword >> 31) & 1 == 1;
            if !is_message {
                if let Some(addr) = current_address.take() {
                    if !message_bits.is_empty() {
                        self.emit(addr, current_function, &message_bits, baud, now);
                    }
                }
                let logical_addr = (codeword >> 13) & 0x3_FFFF;
                current_address = Some((logical_addr << 3) | frame_idx);
                current_function = ((codeword >> 11) & 0x3) as u8;
                message_bits.clear();
            } else {
                if current_address.is_none() {
                    continue;
                }
                for bit_pos in (11..=30).rev() {
                    message_bits.push(((codeword >> bit_pos) & 1) as u8);
                }
            }
        }

        if let Some(addr) = current_address {
            if !message_bits.is_empty() {
                self.emit(addr, current_function, &message_bits, baud, now);
            }
        }
    }

    fn emit(&mut self, address: u32, function: u8, data_bits: &[u8], baud: u32, now: f64) {
        let numeric_text = payload::decode_numeric(data_bits);
        let alpha_text = payload::decode_alpha(data_bits);

        let (content, msg_type) = if payload::is_alpha(&alpha_text) {
            (alpha_text.trim().to_string(), MsgType::Alpha)
        } else {
            (numeric_text.trim().to_string(), MsgType::Numeric)
        };

        if content.is_empty() {
            return;
        }

        if let Some(last) = self.messages.back() {
            if last.address == address
                && last.content == content
                && now - last.timestamp < DUPLICATE_WINDOW_SECS
            {
                return;
            }
        }

        if self.messages.len() >= MAX_HISTORY {
            self.messages.pop_front();
        }
        self.messages.push_back(PocsagMessage {
            address,
            function,
            content,
            msg_type,
            baud,
            timestamp: now,
        });
    }

    /// Returns the newest `limit` messages, oldest first.
    pub fn get_history(&self, limit: usize) -> Vec<PocsagMessage> {
        let len = self.messages.len();
        let skip = len.saturating_sub(limit);
        self.messages.iter().skip(skip).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits_for(value: u32, width: u32) -> Vec<u8> {
        (0..width).rev().map(|i| ((value >> i) & 1) as u8).collect()
    }

    fn even_parity(data31: u32) -> u32 {
        let mut codeword = data31 << 1;
        if !codeword.count_ones().is_multiple_of(2) {
            codeword |= 1;
        }
        codeword
    }

    /// Systematic BCH(31,21) encode: the 10 low bits are the remainder of
    /// dividing `message21 << 10` by the generator, which is exactly what
    /// `bch::syndrome` computes, so XORing it in zeroes the syndrome.
    fn bch_encode(message21: u32) -> u32 {
        let shifted = message21 << 10;
        shifted | bch::syndrome(shifted)
    }

    /// Builds an address codeword (logical_addr, function) with correct BCH
    /// parity. Bit offsets are derived from the codeword-level extraction in
    /// `decode_batch` (`codeword >> 13` for address, `codeword >> 11` for
    /// function, `codeword >> bit_pos` for payload), accounting for the
    /// parity bit occupying codeword bit 0.
    fn address_codeword(logical_addr: u32, function: u32) -> u32 {
        let message21 = (logical_addr << 2) | function;
        even_parity(bch_encode(message21))
    }

    fn message_codeword(payload20: u32) -> u32 {
        let message21 = (1 << 20) | payload20;
        even_parity(bch_encode(message21))
    }

    #[test]
    fn decodes_numeric_message_from_synthetic_batch() {
        let mut decoder = PocsagDecoder::new(48_000.0);

        // All-zero nibbles decode to digit '0' under the bit-reversal
        // (reverse(0) == 0 -> alphabet index 0). They also make the alpha
        // interpretation of the same bits hit a NUL chunk immediately, so
        // the 70%-printable heuristic doesn't mistake this for alpha text.
        let payload_bits = 0u32;

        let mut bits: Vec<u8> = Vec::new();
        bits.extend(bits_for(address_codeword(42, 0), 32));
        bits.extend(bits_for(message_codeword(payload_bits), 32));
        for _ in 1..8 {
            bits.extend(bits_for(POCSAG_IDLE, 32));
        }

        decoder.decode_batch(&bits, 1200, 1000.0);
        let history = decoder.get_history(10);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].address, (42 << 3));
        assert_eq!(history[0].content, "00000");
        assert_eq!(history[0].msg_type, MsgType::Numeric);
    }

    fn alpha_bits(ch: u8) -> Vec<u8> {
        (0..7).map(|b| (ch >> b) & 1).collect()
    }

    #[test]
    fn duplicate_message_within_window_is_suppressed() {
        let mut decoder = PocsagDecoder::new(48_000.0);
        let mut bits = alpha_bits(b'h');
        bits.extend(alpha_bits(b'i'));

        decoder.emit(7, 0, &bits, 1200, 100.0);
        assert_eq!(decoder.messages.len(), 1);
        assert_eq!(decoder.messages[0].content, "hi");

        decoder.emit(7, 0, &bits, 1200, 101.0);
        assert_eq!(
            decoder.messages.len(),
            1,
            "duplicate within 2s window must be suppressed"
        );
    }

    #[test]
    fn history_is_bounded_to_200() {
        let mut decoder = PocsagDecoder::new(48_000.0);
        for i in 0..250u32 {
            decoder.messages.push_back(PocsagMessage {
                address: i,
                function: 0,
                content: format!("m{i}"),
                msg_type: MsgType::Numeric,
                baud: 512,
                timestamp: i as f64,
            });
        }
        while decoder.messages.len() > MAX_HISTORY {
            decoder.messages.pop_front();
        }
        assert_eq!(decoder.messages.len(), MAX_HISTORY);
    }
}
