use std::collections::HashSet;

use postgres::types::ToSql;
use postgres::{Client, Config, NoTls};
use serde_json::Value;
use tracing::{debug, warn};

use super::Store;
use crate::cache::TransactionRef;
use crate::common::{text_field, CandidateEntry, CandidateInfo, CommitteeEntry, ContributionRecord, FilingKey};
use crate::config::TableNames;
use crate::error::StoreError;

pub struct ConnectionSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub dbname: String,
    pub password: String,
}

pub struct PostgresStore {
    client: Client,
    tables: TableNames,
}

fn query_error(table: &str) -> impl FnOnce(postgres::Error) -> StoreError + '_ {
    move |source| StoreError::Query { table: table.to_owned(), source }
}

impl PostgresStore {
    pub fn connect(settings: &ConnectionSettings, tables: TableNames) -> Result<PostgresStore, StoreError> {
        let client = Config::new()
            .host(&settings.host)
            .port(settings.port)
            .user(&settings.user)
            .dbname(&settings.dbname)
            .password(&settings.password)
            .connect(NoTls)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        Ok(PostgresStore { client, tables })
    }

    pub fn create_tables(&mut self) -> Result<(), StoreError> {
        let t = &self.tables;
        let statements = vec![
            (t.committee_names.as_str(), format!(r#"
                CREATE TABLE IF NOT EXISTS {0} (
                    fec_committee_id text not null,
                    committee_name text not null,
                    constraint {0}_pkeys primary key (fec_committee_id));"#, t.committee_names)),
            (t.candidate_info.as_str(), format!(r#"
                CREATE TABLE IF NOT EXISTS {0} (
                    fec_candidate_id text not null,
                    candidate_name text not null,
                    office text,
                    state text,
                    district text,
                    constraint {0}_pkeys primary key (fec_candidate_id));"#, t.candidate_info)),
            (t.late_contributions.as_str(), format!(r#"
                CREATE TABLE IF NOT EXISTS {0} (
                    fec_filing_id text not null,
                    transaction_id text not null,
                    entity_type text,
                    fec_committee_id text not null,
                    fec_candidate_id text,
                    contribution_date text,
                    receipt_date text,
                    committee_name text,
                    candidate_name text,
                    office text,
                    state text,
                    district text,
                    html_url text,
                    extra jsonb not null default '{{}}',
                    constraint {0}_pkeys primary key (fec_filing_id, transaction_id));"#, t.late_contributions)),
            (t.independent_expenditures.as_str(), format!(r#"
                CREATE TABLE IF NOT EXISTS {0} (
                    unique_id text not null,
                    fec_committee_id text,
                    fec_committee_name text,
                    fec_candidate_id text,
                    candidate_name text,
                    office text,
                    state text,
                    district text,
                    payload jsonb not null,
                    constraint {0}_pkeys primary key (unique_id));"#, t.independent_expenditures)),
        ];

        for (table, sql) in statements {
            debug!(table, "creating table");
            self.client.batch_execute(&sql).map_err(query_error(table))?;
        }
        Ok(())
    }
}

impl Store for PostgresStore {
    fn committee_names(&mut self) -> Result<Vec<CommitteeEntry>, StoreError> {
        let table = &self.tables.committee_names;
        let sql = format!("SELECT fec_committee_id, committee_name FROM {}", table);
        let rows = self.client.query(sql.as_str(), &[]).map_err(query_error(table))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(CommitteeEntry {
                committee_id: row.try_get(0).map_err(query_error(table))?,
                committee_name: row.try_get(1).map_err(query_error(table))?,
            });
        }
        Ok(entries)
    }

    fn candidate_infos(&mut self) -> Result<Vec<CandidateEntry>, StoreError> {
        let table = &self.tables.candidate_info;
        let sql = format!("SELECT fec_candidate_id, candidate_name, office, state, district FROM {}", table);
        let rows = self.client.query(sql.as_str(), &[]).map_err(query_error(table))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(CandidateEntry {
                candidate_id: row.try_get(0).map_err(query_error(table))?,
                info: CandidateInfo {
                    candidate_name: row.try_get(1).map_err(query_error(table))?,
                    office: row.try_get(2).map_err(query_error(table))?,
                    state: row.try_get(3).map_err(query_error(table))?,
                    district: row.try_get(4).map_err(query_error(table))?,
                },
            });
        }
        Ok(entries)
    }

    fn seen_late_contributions(&mut self) -> Result<Vec<FilingKey>, StoreError> {
        let table = &self.tables.late_contributions;
        let sql = format!("SELECT fec_filing_id, transaction_id FROM {}", table);
        let rows = self.client.query(sql.as_str(), &[]).map_err(query_error(table))?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            keys.push(FilingKey {
                filing_id: row.try_get(0).map_err(query_error(table))?,
                transaction_id: row.try_get(1).map_err(query_error(table))?,
            });
        }
        Ok(keys)
    }

    fn transaction_references(&mut self) -> Result<Vec<TransactionRef>, StoreError> {
        let table = &self.tables.independent_expenditures;
        let sql = format!(r#"
            SELECT DISTINCT fec_candidate_id, candidate_name, office, state, district, fec_committee_id, fec_committee_name
            FROM {}"#, table);
        let rows = self.client.query(sql.as_str(), &[]).map_err(query_error(table))?;

        let mut references = Vec::with_capacity(rows.len());
        for row in rows {
            references.push(TransactionRef {
                fec_candidate_id: row.try_get(0).map_err(query_error(table))?,
                candidate_name: row.try_get(1).map_err(query_error(table))?,
                office: row.try_get(2).map_err(query_error(table))?,
                state: row.try_get(3).map_err(query_error(table))?,
                district: row.try_get(4).map_err(query_error(table))?,
                fec_committee_id: row.try_get(5).map_err(query_error(table))?,
                fec_committee_name: row.try_get(6).map_err(query_error(table))?,
            });
        }
        Ok(references)
    }

    fn independent_expenditure_ids(&mut self) -> Result<HashSet<String>, StoreError> {
        let table = &self.tables.independent_expenditures;
        let sql = format!("SELECT DISTINCT unique_id FROM {}", table);
        let rows = self.client.query(sql.as_str(), &[]).map_err(query_error(table))?;

        let mut ids = HashSet::with_capacity(rows.len());
        for row in rows {
            ids.insert(row.try_get(0).map_err(query_error(table))?);
        }
        Ok(ids)
    }

    fn append_late_contributions(&mut self, records: &[ContributionRecord]) -> Result<usize, StoreError> {
        let table = &self.tables.late_contributions;
        let sql = format!(r#"
            INSERT INTO {table} (fec_filing_id, transaction_id, entity_type, fec_committee_id, fec_candidate_id,
                contribution_date, receipt_date, committee_name, candidate_name, office, state, district, html_url, extra)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT ON CONSTRAINT {table}_pkeys DO NOTHING"#, table = table);
        let statement = self.client.prepare(&sql).map_err(query_error(table))?;

        let mut inserted = 0;
        for record in records {
            let extra = Value::Object(record.extra.clone());
            let params: [&(dyn ToSql + Sync); 14] = [
                &record.fec_filing_id, &record.transaction_id, &record.entity_type, &record.fec_committee_id,
                &record.fec_candidate_id, &record.contribution_date, &record.receipt_date, &record.committee_name,
                &record.candidate_name, &record.office, &record.state, &record.district, &record.html_url, &extra,
            ];
            inserted += self.client.execute(&statement, &params).map_err(query_error(table))?;
        }
        Ok(inserted as usize)
    }

    fn append_committee_names(&mut self, entries: &[CommitteeEntry]) -> Result<usize, StoreError> {
        let table = &self.tables.committee_names;
        let sql = format!(r#"
            INSERT INTO {table} (fec_committee_id, committee_name) VALUES ($1, $2)
            ON CONFLICT ON CONSTRAINT {table}_pkeys DO NOTHING"#, table = table);
        let statement = self.client.prepare(&sql).map_err(query_error(table))?;

        let mut inserted = 0;
        for entry in entries {
            inserted += self.client.execute(&statement, &[&entry.committee_id, &entry.committee_name]).map_err(query_error(table))?;
        }
        Ok(inserted as usize)
    }

    fn append_candidate_infos(&mut self, entries: &[CandidateEntry]) -> Result<usize, StoreError> {
        let table = &self.tables.candidate_info;
        let sql = format!(r#"
            INSERT INTO {table} (fec_candidate_id, candidate_name, office, state, district) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT ON CONSTRAINT {table}_pkeys DO NOTHING"#, table = table);
        let statement = self.client.prepare(&sql).map_err(query_error(table))?;

        let mut inserted = 0;
        for entry in entries {
            let info = &entry.info;
            inserted += self.client.execute(
                &statement,
                &[&entry.candidate_id, &info.candidate_name, &info.office, &info.state, &info.district],
            ).map_err(query_error(table))?;
        }
        Ok(inserted as usize)
    }

    fn append_independent_expenditures(&mut self, rows: &[Value]) -> Result<usize, StoreError> {
        let table = &self.tables.independent_expenditures;
        let sql = format!(r#"
            INSERT INTO {table} (unique_id, fec_committee_id, fec_committee_name, fec_candidate_id, candidate_name,
                office, state, district, payload)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT ON CONSTRAINT {table}_pkeys DO NOTHING"#, table = table);
        let statement = self.client.prepare(&sql).map_err(query_error(table))?;

        let mut inserted = 0;
        for row in rows {
            let unique_id = match text_field(row, "unique_id") {
                Some(id) => id,
                None => {
                    warn!(table = table.as_str(), "skipping independent expenditure without a unique_id");
                    continue;
                }
            };
            let columns: Vec<Option<String>> = ["fec_committee_id", "fec_committee_name", "fec_candidate_id", "candidate_name", "office", "state", "district"]
                .iter()
                .map(|c| text_field(row, c))
                .collect();
            let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
            params.push(&unique_id);
            for column in &columns {
                params.push(column);
            }
            params.push(row);

            inserted += self.client.execute(&statement, &params[..]).map_err(query_error(table))?;
        }
        Ok(inserted as usize)
    }
}
