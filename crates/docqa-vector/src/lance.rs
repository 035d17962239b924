//! LanceDB-backed [`VectorStore`].
//!
//! LanceDB is async; this store owns a tokio runtime and blocks on each call so
//! it fits the synchronous store trait.
use arrow_array::cast::AsArray;
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType, Table};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::debug;

use docqa_core::error::{Error, Result};
use docqa_core::traits::VectorStore;
use docqa_core::types::{ChunkMetadata, Distance, Payload, StoredPoint};

use crate::schema::build_arrow_schema;

pub struct LanceStore {
	rt: Runtime,
	db: Connection,
	table_name: String,
	dimension: usize,
}

fn store_err<E: std::fmt::Display>(e: E) -> Error {
	Error::Store(e.to_string())
}

impl LanceStore {
	/// Connect to the database at `uri`. The table is opened lazily per call.
	pub fn open(uri: &str, table_name: &str, dimension: usize) -> Result<Self> {
		let rt = Runtime::new()?;
		let db = rt.block_on(async { connect(uri).execute().await }).map_err(store_err)?;
		Ok(Self { rt, db, table_name: table_name.to_string(), dimension })
	}

	fn table(&self) -> Result<Table> {
		self.rt
			.block_on(async { self.db.open_table(&self.table_name).execute().await })
			.map_err(|e| Error::NotFound(format!("table {}: {e}", self.table_name)))
	}

	fn points_to_record_batch(&self, points: &[StoredPoint]) -> Result<RecordBatch> {
		let schema = build_arrow_schema(self.dimension as i32);
		let mut ids = Vec::new();
		let mut sources = Vec::new();
		let mut pages = Vec::new();
		let mut chunk_indices = Vec::new();
		let mut contents = Vec::new();
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
		for p in points {
			if p.vector.len() != self.dimension {
				return Err(Error::Store(format!("point {} has {} dimensions, table expects {}", p.id, p.vector.len(), self.dimension)));
			}
			ids.push(p.id.clone());
			sources.push(p.payload.metadata.source.clone());
			pages.push(p.payload.metadata.page as i32);
			chunk_indices.push(p.payload.metadata.chunk_index as i32);
			contents.push(p.payload.content.clone());
			vectors.push(Some(p.vector.iter().map(|&x| Some(x)).collect()));
		}
		RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(sources)),
			Arc::new(Int32Array::from(pages)),
			Arc::new(Int32Array::from(chunk_indices)),
			Arc::new(StringArray::from(contents)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dimension as i32)),
		])
		.map_err(store_err)
	}
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| Error::Store(format!("missing {name} column")))
}

fn int_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a Int32Array> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<Int32Array>())
		.ok_or_else(|| Error::Store(format!("missing {name} column")))
}

fn decode_batches(batches: Result<Vec<RecordBatch>>) -> Result<Vec<(StoredPoint, Option<f32>)>> {
	let mut out = Vec::new();
	for batch in batches? {
		out.extend(rows_from_batch(&batch)?);
	}
	Ok(out)
}

/// Decode rows; the second element is the `_distance` column when present.
fn rows_from_batch(batch: &RecordBatch) -> Result<Vec<(StoredPoint, Option<f32>)>> {
	let ids = string_col(batch, "id")?;
	let sources = string_col(batch, "source")?;
	let contents = string_col(batch, "content")?;
	let pages = int_col(batch, "page")?;
	let chunk_indices = int_col(batch, "chunk_index")?;
	let vectors = batch.column_by_name("vector").and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>());
	let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());

	let mut rows = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let vector = match vectors {
			Some(v) if v.is_valid(i) => v.value(i).as_primitive::<arrow_array::types::Float32Type>().values().to_vec(),
			_ => Vec::new(),
		};
		let point = StoredPoint {
			id: ids.value(i).to_string(),
			vector,
			payload: Payload {
				content: contents.value(i).to_string(),
				metadata: ChunkMetadata {
					source: sources.value(i).to_string(),
					page: pages.value(i).max(0) as u32,
					chunk_index: chunk_indices.value(i).max(0) as usize,
				},
			},
		};
		rows.push((point, distances.map(|d| d.value(i))));
	}
	Ok(rows)
}

impl VectorStore for LanceStore {
	fn collection_exists(&self) -> Result<bool> {
		let names = self.rt.block_on(async { self.db.table_names().execute().await }).map_err(store_err)?;
		Ok(names.contains(&self.table_name))
	}

	fn create_collection(&mut self, dim: usize, _distance: Distance) -> Result<()> {
		if self.collection_exists()? {
			return Ok(());
		}
		self.dimension = dim;
		let schema = build_arrow_schema(dim as i32);
		// create empty table with 0 rows
		let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
		self.rt
			.block_on(async { self.db.create_table(&self.table_name, Box::new(iter)).execute().await })
			.map_err(store_err)?;
		debug!(table = %self.table_name, dim, "created lance table");
		Ok(())
	}

	fn upsert(&mut self, points: Vec<StoredPoint>) -> Result<()> {
		if points.is_empty() {
			return Ok(());
		}
		let table = self.table()?;
		let batch = self.points_to_record_batch(&points)?;
		let schema = batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
		// Upsert behavior via merge_insert: id is unique
		let mut mi = table.merge_insert(&["id"]);
		mi.when_matched_update_all(None).when_not_matched_insert_all();
		self.rt.block_on(async { mi.execute(reader).await }).map_err(store_err)?;
		Ok(())
	}

	fn search(&self, vector: &[f32], k: usize) -> Result<Vec<(StoredPoint, f32)>> {
		let table = self.table()?;
		let batches = self.rt.block_on(async {
			let stream = table
				.vector_search(vector.to_vec())?
				.distance_type(DistanceType::Cosine)
				.limit(k)
				.execute()
				.await?;
			stream.try_collect::<Vec<RecordBatch>>().await
		});
		let rows = decode_batches(batches.map_err(store_err))?;
		// cosine distance is 1 - similarity
		Ok(rows.into_iter().map(|(p, d)| (p, 1.0 - d.unwrap_or(1.0))).collect())
	}

	fn scroll(&self, limit: usize) -> Result<Vec<StoredPoint>> {
		let table = self.table()?;
		let batches = self.rt.block_on(async {
			let stream = table.query().limit(limit).execute().await?;
			stream.try_collect::<Vec<RecordBatch>>().await
		});
		let rows = decode_batches(batches.map_err(store_err))?;
		Ok(rows.into_iter().map(|(p, _)| p).collect())
	}

	fn count(&self) -> Result<usize> {
		let table = self.table()?;
		self.rt.block_on(async { table.count_rows(None).await }).map_err(store_err)
	}

	fn delete_collection(&mut self) -> Result<()> {
		if !self.collection_exists()? {
			return Ok(());
		}
		let table = self.table()?;
		// emptying keeps the schema; create_collection is then a no-op
		self.rt.block_on(async { table.delete("true").await }).map_err(store_err)?;
		Ok(())
	}
}
