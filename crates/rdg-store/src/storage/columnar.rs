// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 Dragonscale Team

//! Encoding of property columns as Parquet streams and of entity-type-id
//! arrays as raw little-endian halfwords, plus the content-addressed file
//! naming used by commits.

use crate::properties::table::PropertyColumn;
use arrow_array::RecordBatch;
use arrow_schema::Schema;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::arrow_writer::ArrowWriter;
use rdg_common::{EntityTypeId, RdgError, Result};
use std::sync::Arc;
use uuid::Uuid;

/// `<name>.<rand>.parquet` — a fresh file per write, so concurrent commits
/// never collide on a property file.
pub fn rand_property_file_name(name: &str) -> String {
    format!("{name}.{}.parquet", Uuid::new_v4().simple())
}

pub fn rand_topology_file_name() -> String {
    format!("topology.{}", Uuid::new_v4().simple())
}

pub fn rand_type_id_array_file_name(scope: &str) -> String {
    format!("{scope}_entity_type_ids.{}", Uuid::new_v4().simple())
}

/// Serialize one chunked column; each chunk becomes its own row group.
pub fn encode_column(column: &PropertyColumn) -> Result<Bytes> {
    let schema = Arc::new(Schema::new(vec![column.field().clone()]));
    let mut out = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut out, schema.clone(), None)?;
    for chunk in column.chunks() {
        let batch = RecordBatch::try_new(schema.clone(), vec![chunk.clone()])?;
        writer.write(&batch)?;
    }
    writer.close()?;
    Ok(Bytes::from(out))
}

/// Decode a single-column Parquet stream back into a chunked column named
/// `name` (file-internal naming is not trusted across renames).
pub fn decode_column(name: &str, bytes: Bytes) -> Result<PropertyColumn> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)?;
    let schema = builder.schema().clone();
    if schema.fields().len() != 1 {
        return Err(RdgError::SchemaMismatch(format!(
            "property file for '{name}' holds {} columns, expected 1",
            schema.fields().len()
        )));
    }
    let reader = builder.with_batch_size(1 << 20).build()?;
    let mut chunks = Vec::new();
    for batch in reader {
        chunks.push(batch?.column(0).clone());
    }
    if chunks.is_empty() {
        // zero-row column: keep the type, hold no values
        chunks.push(arrow_array::new_empty_array(schema.field(0).data_type()));
    }
    PropertyColumn::new(name, chunks)
}

pub fn encode_type_id_array(ids: &[EntityTypeId]) -> Bytes {
    let mut buf = BytesMut::with_capacity(ids.len() * 2);
    for &id in ids {
        buf.put_u16_le(id);
    }
    buf.freeze()
}

pub fn decode_type_id_array(mut bytes: Bytes) -> Result<Vec<EntityTypeId>> {
    if bytes.len() % 2 != 0 {
        return Err(RdgError::SchemaMismatch(
            "entity type id array has odd byte length".into(),
        ));
    }
    let mut ids = Vec::with_capacity(bytes.len() / 2);
    while bytes.has_remaining() {
        ids.push(bytes.get_u16_le());
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow_array::{ArrayRef, Int64Array, StringArray};

    #[test]
    fn test_column_parquet_round_trip() {
        let column = PropertyColumn::new(
            "w",
            vec![
                Arc::new(Int64Array::from(vec![1, 2])) as ArrayRef,
                Arc::new(Int64Array::from(vec![3])) as ArrayRef,
            ],
        )
        .unwrap();
        let bytes = encode_column(&column).unwrap();
        let back = decode_column("w", bytes).unwrap();
        assert_eq!(back.name(), "w");
        assert_eq!(back.len(), 3);
        assert!(back.logical_eq(&column));
    }

    #[test]
    fn test_string_column_round_trip() {
        let column = PropertyColumn::new(
            "label",
            vec![Arc::new(StringArray::from(vec![Some("a"), None, Some("c")])) as ArrayRef],
        )
        .unwrap();
        let back = decode_column("label", encode_column(&column).unwrap()).unwrap();
        assert!(back.logical_eq(&column));
    }

    #[test]
    fn test_empty_column_round_trip() {
        let column = PropertyColumn::new(
            "hollow",
            vec![Arc::new(Int64Array::from(Vec::<i64>::new())) as ArrayRef],
        )
        .unwrap();
        let back = decode_column("hollow", encode_column(&column).unwrap()).unwrap();
        assert_eq!(back.len(), 0);
        assert_eq!(back.data_type(), column.data_type());
    }

    #[test]
    fn test_type_id_array_round_trip() {
        let ids: Vec<EntityTypeId> = vec![0, 1, 7, u16::MAX];
        let back = decode_type_id_array(encode_type_id_array(&ids)).unwrap();
        assert_eq!(back, ids);
        assert!(decode_type_id_array(Bytes::from_static(&[1, 2, 3])).is_err());
    }

    #[test]
    fn test_rand_names_are_unique() {
        assert_ne!(rand_property_file_name("w"), rand_property_file_name("w"));
        assert!(rand_property_file_name("w").starts_with("w."));
        assert!(rand_property_file_name("w").ends_with(".parquet"));
    }
}
