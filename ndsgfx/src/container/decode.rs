use super::{
    container_error, Block, BlockLayout, Container, ContainerError, ReadWarning, Tag, Version,
    BLOCK_HEADER_LEN, BYTE_ORDER_MARK, HEADER_LEN, SIZE_SLACK,
};
use byteorder::{LittleEndian, ReadBytesExt};
use snafu::ensure;
use std::io::{self, Cursor, Read};

fn truncated(what: &'static str) -> impl FnOnce(io::Error) -> ContainerError {
    move |_| ContainerError::Truncated { what }
}

impl Container {
    /// Decodes a container. Recoverable anomalies are logged and otherwise ignored.
    pub fn read(data: &[u8], layout: BlockLayout) -> Result<Self, ContainerError> {
        Self::read_with_warnings(data, layout).map(|(container, _)| container)
    }

    /// Decodes a container, also returning the recoverable anomalies that were found.
    ///
    /// Structural problems (truncation, a bad byte order mark, unknown blocks) abort the whole
    /// read.
    pub fn read_with_warnings(
        data: &[u8],
        layout: BlockLayout,
    ) -> Result<(Self, Vec<ReadWarning>), ContainerError> {
        let mut warnings = Vec::new();
        let mut r = Cursor::new(data);

        let mut magic = [0; 4];
        r.read_exact(&mut magic).map_err(truncated("header"))?;
        let magic = Tag::from_bytes(magic);

        let bom = r.read_u16::<LittleEndian>().map_err(truncated("header"))?;
        match bom {
            BYTE_ORDER_MARK => {}
            0 => warnings.push(ReadWarning::ZeroByteOrderMark),
            bom => return container_error::ByteOrderSnafu { bom }.fail(),
        }

        let version = Version::from_u16(r.read_u16::<LittleEndian>().map_err(truncated("header"))?);

        let declared = r.read_u32::<LittleEndian>().map_err(truncated("header"))? as usize;
        ensure!(
            declared <= data.len() + SIZE_SLACK,
            container_error::TruncatedSnafu { what: "file" }
        );
        if declared != data.len() {
            warnings.push(ReadWarning::SizeMismatch {
                declared,
                actual: data.len(),
            });
        }

        let table_offset = r.read_u16::<LittleEndian>().map_err(truncated("header"))?;
        let count = r.read_u16::<LittleEndian>().map_err(truncated("header"))?;
        ensure!(
            table_offset >= HEADER_LEN,
            container_error::InvalidHeaderSnafu {
                field: "block table offset",
                value: u32::from(table_offset),
            }
        );

        let offsets = match layout {
            BlockLayout::Sequential => None,
            BlockLayout::OffsetTable => {
                r.set_position(u64::from(table_offset));
                let offsets = (0..count)
                    .map(|_| {
                        r.read_u32::<LittleEndian>()
                            .map(|offset| offset as usize)
                            .map_err(truncated("block table"))
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Some(offsets)
            }
        };

        let mut blocks = Vec::with_capacity(usize::from(count));
        let mut position = usize::from(table_offset);
        for i in 0..usize::from(count) {
            let start = offsets.as_ref().map_or(position, |offsets| offsets[i]);
            let (block, size) = read_block(data, start)?;
            blocks.push(block);
            // Trust the declared size over what the payload decoder consumed.
            position = start + size;
        }

        for warning in &warnings {
            log::warn!("{magic} file: {warning}");
        }

        Ok((
            Container {
                magic,
                version,
                layout,
                blocks,
            },
            warnings,
        ))
    }
}

/// Decodes the block starting at `start`, returning it and its declared size.
fn read_block(data: &[u8], start: usize) -> Result<(Block, usize), ContainerError> {
    let header = start
        .checked_add(BLOCK_HEADER_LEN)
        .and_then(|end| data.get(start..end))
        .ok_or(ContainerError::Truncated {
            what: "block header",
        })?;

    let mut r = Cursor::new(header);
    let mut tag = [0; 4];
    r.read_exact(&mut tag).map_err(truncated("block header"))?;
    let tag = Tag::from_bytes(tag);
    let size = r.read_u32::<LittleEndian>().map_err(truncated("block header"))? as usize;

    ensure!(
        size >= BLOCK_HEADER_LEN,
        container_error::MalformedBlockSnafu {
            tag,
            reason: format!("block size {size} is smaller than its header"),
        }
    );
    let payload = data
        .get(start + BLOCK_HEADER_LEN..start + size)
        .ok_or(ContainerError::Truncated { what: "block" })?;

    log::debug!("reading {tag} block at {start:#x}, {size} bytes");
    let block = Block::decode(tag, payload)?;

    Ok((block, size))
}
