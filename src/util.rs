mod byte_stream;

pub use byte_stream::ByteStream;
