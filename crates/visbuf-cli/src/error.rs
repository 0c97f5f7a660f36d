use visbuf_cluster::GeometryError;
use visbuf_codec::CodecError;
use visbuf_config::ConfigError;
use visbuf_render::DumpError;

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Dump(#[from] DumpError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("png encoding failed: {0}")]
    Png(#[from] png::EncodingError),
}
