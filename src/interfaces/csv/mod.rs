pub mod fragment_reader;
