use super::{
    container_error, BlockLayout, Container, ContainerError, BLOCK_HEADER_LEN, BYTE_ORDER_MARK,
    HEADER_LEN,
};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use snafu::ResultExt;

impl Container {
    /// Encodes the container.
    ///
    /// Block sizes, offsets and the total size are recomputed from the current blocks, so
    /// writing never depends on sizes found while reading.
    pub fn write(&self) -> Result<Vec<u8>, ContainerError> {
        let count = u16::try_from(self.blocks.len()).map_err(|_| ContainerError::Capacity {
            what: "block count",
            value: self.blocks.len(),
        })?;

        let mut payloads = Vec::with_capacity(self.blocks.len());
        for block in &self.blocks {
            let mut payload = Vec::new();
            block.encode(&mut payload)?;
            payloads.push((block.tag(), payload));
        }

        let mut w = Vec::with_capacity(
            usize::from(HEADER_LEN)
                + payloads
                    .iter()
                    .map(|(_, p)| p.len() + BLOCK_HEADER_LEN + 4)
                    .sum::<usize>(),
        );

        w.extend_from_slice(&self.magic.to_bytes());
        w.write_u16::<LittleEndian>(BYTE_ORDER_MARK)
            .context(container_error::WriteIoSnafu)?;
        w.write_u16::<LittleEndian>(self.version.to_u16())
            .context(container_error::WriteIoSnafu)?;
        // total size, patched below
        w.write_u32::<LittleEndian>(0)
            .context(container_error::WriteIoSnafu)?;
        w.write_u16::<LittleEndian>(HEADER_LEN)
            .context(container_error::WriteIoSnafu)?;
        w.write_u16::<LittleEndian>(count)
            .context(container_error::WriteIoSnafu)?;

        if self.layout == BlockLayout::OffsetTable {
            let mut offset = w.len() + 4 * payloads.len();
            for (_, payload) in &payloads {
                w.write_u32::<LittleEndian>(block_u32("block offset", offset)?)
                    .context(container_error::WriteIoSnafu)?;
                offset += BLOCK_HEADER_LEN + payload.len();
            }
        }

        for (tag, payload) in &payloads {
            let size = block_u32("block size", BLOCK_HEADER_LEN + payload.len())?;
            w.extend_from_slice(&tag.to_bytes());
            w.write_u32::<LittleEndian>(size)
                .context(container_error::WriteIoSnafu)?;
            w.extend_from_slice(payload);
        }

        let total = block_u32("file size", w.len())?;
        LittleEndian::write_u32(&mut w[8..12], total);

        Ok(w)
    }
}

fn block_u32(what: &'static str, value: usize) -> Result<u32, ContainerError> {
    u32::try_from(value).map_err(|_| ContainerError::Capacity { what, value })
}
