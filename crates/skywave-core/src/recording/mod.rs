pub mod iq_writer;
pub mod wav_writer;

pub use iq_writer::IqWriter;
pub use wav_writer::WavWriter;
