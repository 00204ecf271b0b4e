//! A `postgres`-backed [`StoreGateway`], behind the `postgres` feature.
//! Same schema and transaction shape as [`super::sqlite::SqliteStore`];
//! the two are kept side by side (as the teacher keeps
//! `checkpointer_sqlite`/`checkpointer_postgres` side by side) rather
//! than factored through a shared SQL-builder, since the placeholder
//! syntax (`?` vs `$1`) and `RETURNING`/upsert clauses differ enough
//! that a shared abstraction would cost more than it saves.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use sqlx::{PgPool, Row};

use crate::event_bus::RevisionBus;
use crate::store::errors::{Result, StoreError};
use crate::store::gateway::{ExecutionSnapshot, StoreGateway};
use crate::store::model::{
    Claim, Computation, ComputationOutcome, ComputationState, Execution, NodeInstance, NodeValue,
};
use crate::types::{GraphRef, NodeName, Revision, Value};
use crate::utils::id;

pub struct PostgresStore {
    pool: PgPool,
    bus: Arc<RevisionBus>,
}

fn backend(err: sqlx::Error) -> StoreError {
    StoreError::Backend {
        message: err.to_string(),
    }
}

fn parse_state(tag: &str) -> ComputationState {
    match tag {
        "computing" => ComputationState::Computing,
        "success" => ComputationState::Success,
        "failed" => ComputationState::Failed,
        "abandoned" => ComputationState::Abandoned,
        _ => ComputationState::Cancelled,
    }
}

impl PostgresStore {
    pub async fn connect(database_url: &str, bus: Arc<RevisionBus>) -> Result<Self> {
        let pool = PgPool::connect(database_url).await.map_err(backend)?;
        sqlx::migrate!("./migrations/postgres")
            .run(&pool)
            .await
            .map_err(|e| StoreError::Backend {
                message: e.to_string(),
            })?;
        Ok(Self { pool, bus })
    }

    fn publish(&self, execution_id: &str, node_name: &NodeName, revision: Revision) {
        let _ = self
            .bus
            .publish_revision(execution_id.to_string(), node_name.clone(), revision);
    }
}

#[async_trait]
impl StoreGateway for PostgresStore {
    async fn create_execution(&self, graph_ref: GraphRef, nodes: Vec<NodeName>) -> Result<Execution> {
        let execution_id = id::new_execution_id();
        let mut tx = self.pool.begin().await.map_err(backend)?;
        sqlx::query(
            "INSERT INTO executions (id, graph_name, graph_version, revision, archived_at) VALUES ($1, $2, $3, 1, NULL)",
        )
        .bind(&execution_id)
        .bind(&graph_ref.name)
        .bind(graph_ref.version as i32)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        for name in &nodes {
            sqlx::query(
                "INSERT INTO node_instances (execution_id, node_name, value_json, set_revision, set_time) VALUES ($1, $2, NULL, 0, NULL)",
            )
            .bind(&execution_id)
            .bind(name.as_str())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }
        tx.commit().await.map_err(backend)?;

        Ok(Execution {
            id: execution_id,
            graph_ref,
            revision: 1,
            archived_at: None,
        })
    }

    async fn load_execution(&self, execution_id: &str) -> Result<ExecutionSnapshot> {
        let row = sqlx::query(
            "SELECT graph_name, graph_version, revision, archived_at FROM executions WHERE id = $1",
        )
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?
        .ok_or_else(|| StoreError::UnknownExecution {
            execution_id: execution_id.to_string(),
        })?;

        let execution = Execution {
            id: execution_id.to_string(),
            graph_ref: GraphRef::new(row.get::<String, _>("graph_name"), row.get::<i32, _>("graph_version") as u32),
            revision: row.get::<i64, _>("revision") as Revision,
            archived_at: row.get::<Option<DateTime<Utc>>, _>("archived_at"),
        };

        let node_rows = sqlx::query(
            "SELECT node_name, value_json, set_revision, set_time FROM node_instances WHERE execution_id = $1",
        )
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut nodes = FxHashMap::default();
        for row in node_rows {
            let name = NodeName::from(row.get::<String, _>("node_name"));
            let value_json: Option<serde_json::Value> = row.get("value_json");
            let value = match value_json {
                Some(v) => NodeValue::Set(v),
                None => NodeValue::NotSet,
            };
            nodes.insert(
                name.clone(),
                NodeInstance {
                    node_name: name,
                    value,
                    set_revision: row.get::<i64, _>("set_revision") as Revision,
                    set_time: row.get::<Option<i64>, _>("set_time"),
                },
            );
        }

        let comp_rows = sqlx::query(
            "SELECT id, node_name, state, attempt_index, started_at, deadline, completed_at, ex_revision_at_start, upstream_revisions_json, result_json, error_json FROM computations WHERE execution_id = $1 ORDER BY attempt_index ASC",
        )
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let mut computations: FxHashMap<NodeName, Vec<Computation>> = FxHashMap::default();
        for row in comp_rows {
            let node_name = NodeName::from(row.get::<String, _>("node_name"));
            let upstream_revisions: FxHashMap<NodeName, Revision> =
                serde_json::from_value(row.get::<serde_json::Value, _>("upstream_revisions_json")).unwrap_or_default();
            let computation = Computation {
                id: row.get("id"),
                execution_id: execution_id.to_string(),
                node_name: node_name.clone(),
                state: parse_state(&row.get::<String, _>("state")),
                attempt_index: row.get::<i32, _>("attempt_index") as u32,
                started_at: row.get("started_at"),
                deadline: row.get("deadline"),
                completed_at: row.get("completed_at"),
                ex_revision_at_start: row.get::<i64, _>("ex_revision_at_start") as Revision,
                upstream_revisions,
                result_payload: row.get("result_json"),
                error_payload: row.get("error_json"),
            };
            computations.entry(node_name).or_default().push(computation);
        }

        Ok(ExecutionSnapshot {
            execution,
            nodes,
            computations,
        })
    }

    async fn write_value(
        &self,
        execution_id: &str,
        node_name: &NodeName,
        value: Value,
    ) -> Result<Revision> {
        let mut tx = self.pool.begin().await.map_err(backend)?;
        let archived: Option<DateTime<Utc>> =
            sqlx::query_scalar("SELECT archived_at FROM executions WHERE id = $1")
                .bind(execution_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend)?
                .ok_or_else(|| StoreError::UnknownExecution {
                    execution_id: execution_id.to_string(),
                })?;
        if archived.is_some() {
            return Err(StoreError::ExecutionArchived {
                execution_id: execution_id.to_string(),
            });
        }

        let revision: i64 = sqlx::query_scalar(
            "UPDATE executions SET revision = revision + 1 WHERE id = $1 RETURNING revision",
        )
        .bind(execution_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        let now = Utc::now().timestamp();
        sqlx::query(
            "INSERT INTO node_instances (execution_id, node_name, value_json, set_revision, set_time)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (execution_id, node_name) DO UPDATE SET value_json = excluded.value_json, set_revision = excluded.set_revision, set_time = excluded.set_time",
        )
        .bind(execution_id)
        .bind(node_name.as_str())
        .bind(&value)
        .bind(revision)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        self.publish(execution_id, node_name, revision as Revision);
        Ok(revision as Revision)
    }

    async fn claim_computation(
        &self,
        execution_id: &str,
        node_name: &NodeName,
        deadline: DateTime<Utc>,
        ex_rev_seen: Revision,
        upstream_revisions: FxHashMap<NodeName, Revision>,
    ) -> Result<Claim> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query("SELECT revision, archived_at FROM executions WHERE id = $1")
            .bind(execution_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::UnknownExecution {
                execution_id: execution_id.to_string(),
            })?;
        if row.get::<Option<DateTime<Utc>>, _>("archived_at").is_some() {
            return Err(StoreError::ExecutionArchived {
                execution_id: execution_id.to_string(),
            });
        }
        if row.get::<i64, _>("revision") as Revision != ex_rev_seen {
            return Err(StoreError::Conflict {
                execution_id: execution_id.to_string(),
                node_name: node_name.to_string(),
            });
        }

        let attempt_index: i32 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(attempt_index), 0) + 1 FROM computations WHERE execution_id = $1 AND node_name = $2",
        )
        .bind(execution_id)
        .bind(node_name.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        let token = id::new_computation_id();
        let upstream_json = serde_json::to_value(&upstream_revisions).map_err(|e| StoreError::Backend {
            message: e.to_string(),
        })?;

        let inserted = sqlx::query(
            "INSERT INTO computations (id, execution_id, node_name, state, attempt_index, started_at, deadline, ex_revision_at_start, upstream_revisions_json)
             VALUES ($1, $2, $3, 'computing', $4, $5, $6, $7, $8)",
        )
        .bind(&token)
        .bind(execution_id)
        .bind(node_name.as_str())
        .bind(attempt_index)
        .bind(Utc::now())
        .bind(deadline)
        .bind(ex_rev_seen as i64)
        .bind(&upstream_json)
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            return Err(match err {
                sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict {
                    execution_id: execution_id.to_string(),
                    node_name: node_name.to_string(),
                },
                other => backend(other),
            });
        }

        let revision: i64 = sqlx::query_scalar(
            "UPDATE executions SET revision = revision + 1 WHERE id = $1 RETURNING revision",
        )
        .bind(execution_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        tx.commit().await.map_err(backend)?;
        self.publish(execution_id, node_name, revision as Revision);

        Ok(Claim {
            token,
            execution_id: execution_id.to_string(),
            node_name: node_name.clone(),
            attempt_index: attempt_index as u32,
            deadline,
            ex_revision_at_start: ex_rev_seen,
            upstream_revisions,
        })
    }

    async fn complete_computation(
        &self,
        token: &str,
        target: &NodeName,
        outcome: ComputationOutcome,
    ) -> Result<Revision> {
        let mut tx = self.pool.begin().await.map_err(backend)?;

        let row = sqlx::query("SELECT execution_id FROM computations WHERE id = $1")
            .bind(token)
            .fetch_optional(&mut *tx)
            .await
            .map_err(backend)?
            .ok_or_else(|| StoreError::UnknownClaim {
                token: token.to_string(),
            })?;
        let execution_id: String = row.get("execution_id");

        let (state, result_json, error_json): (&str, Option<serde_json::Value>, Option<serde_json::Value>) =
            match &outcome {
                ComputationOutcome::Success(value) => ("success", Some(value.clone()), None),
                ComputationOutcome::Failed(payload) => ("failed", None, Some(payload.clone())),
                ComputationOutcome::Abandoned => ("abandoned", None, None),
                ComputationOutcome::Cancelled => ("cancelled", None, None),
            };

        sqlx::query(
            "UPDATE computations SET state = $1, completed_at = $2, result_json = $3, error_json = $4 WHERE id = $5",
        )
        .bind(state)
        .bind(Utc::now())
        .bind(&result_json)
        .bind(&error_json)
        .bind(token)
        .execute(&mut *tx)
        .await
        .map_err(backend)?;

        let revision: i64 = sqlx::query_scalar(
            "UPDATE executions SET revision = revision + 1 WHERE id = $1 RETURNING revision",
        )
        .bind(&execution_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(backend)?;

        if let ComputationOutcome::Success(value) = &outcome {
            sqlx::query(
                "INSERT INTO node_instances (execution_id, node_name, value_json, set_revision, set_time)
                 VALUES ($1, $2, $3, $4, $5)
                 ON CONFLICT (execution_id, node_name) DO UPDATE SET value_json = excluded.value_json, set_revision = excluded.set_revision, set_time = excluded.set_time",
            )
            .bind(&execution_id)
            .bind(target.as_str())
            .bind(value)
            .bind(revision)
            .bind(Utc::now().timestamp())
            .execute(&mut *tx)
            .await
            .map_err(backend)?;
        }

        tx.commit().await.map_err(backend)?;
        self.publish(&execution_id, target, revision as Revision);
        Ok(revision as Revision)
    }

    async fn list_live_executions(&self, cursor: Option<String>, limit: usize) -> Result<Vec<Execution>> {
        let rows = sqlx::query(
            "SELECT id, graph_name, graph_version, revision FROM executions
             WHERE archived_at IS NULL AND id > $1
             ORDER BY id ASC LIMIT $2",
        )
        .bind(cursor.unwrap_or_default())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|row| Execution {
                id: row.get("id"),
                graph_ref: GraphRef::new(row.get::<String, _>("graph_name"), row.get::<i32, _>("graph_version") as u32),
                revision: row.get::<i64, _>("revision") as Revision,
                archived_at: None,
            })
            .collect())
    }

    async fn list_stale_computations(&self, threshold: DateTime<Utc>) -> Result<Vec<Computation>> {
        let rows = sqlx::query(
            "SELECT id, execution_id, node_name, attempt_index, started_at, deadline, ex_revision_at_start, upstream_revisions_json
             FROM computations WHERE state = 'computing' AND deadline < $1",
        )
        .bind(threshold)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        Ok(rows
            .into_iter()
            .map(|row| Computation {
                id: row.get("id"),
                execution_id: row.get("execution_id"),
                node_name: NodeName::from(row.get::<String, _>("node_name")),
                state: ComputationState::Computing,
                attempt_index: row.get::<i32, _>("attempt_index") as u32,
                started_at: row.get("started_at"),
                deadline: row.get("deadline"),
                completed_at: None,
                ex_revision_at_start: row.get::<i64, _>("ex_revision_at_start") as Revision,
                upstream_revisions: serde_json::from_value(row.get::<serde_json::Value, _>("upstream_revisions_json"))
                    .unwrap_or_default(),
                result_payload: None,
                error_payload: None,
            })
            .collect())
    }

    async fn archive_execution(&self, execution_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE executions SET archived_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(execution_id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::UnknownExecution {
                execution_id: execution_id.to_string(),
            });
        }
        Ok(())
    }
}
