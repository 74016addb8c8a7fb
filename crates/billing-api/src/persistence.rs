use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use billing_core::{reporting, JournalRecord};
use contracts::{
    Campaign, DailyBurnRow, EngineConfig, LedgerEntry, LedgerEntryKind, PendingDeposit, RateCard,
    Sponsor,
};
use rusqlite::{params, Connection, OptionalExtension};

/// Full engine state as loaded from disk, ready for `AdEngine::restore`.
#[derive(Debug)]
pub struct PersistedEngineState {
    pub config: EngineConfig,
    pub sponsors: Vec<Sponsor>,
    pub ledgers: BTreeMap<String, Vec<LedgerEntry>>,
    pub campaigns: Vec<Campaign>,
    pub deposits: Vec<PendingDeposit>,
    pub rates: RateCard,
}

#[derive(Debug)]
pub enum PersistenceError {
    Sqlite(rusqlite::Error),
    Serde(serde_json::Error),
    NotAttached,
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite error: {err}"),
            Self::Serde(err) => write!(f, "serde error: {err}"),
            Self::NotAttached => write!(f, "sqlite store is not attached"),
        }
    }
}

impl std::error::Error for PersistenceError {}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}

#[derive(Debug)]
pub struct SqliteBillingStore {
    conn: Connection,
}

impl SqliteBillingStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        let mut store = Self { conn };
        store.configure()?;
        store.migrate()?;
        Ok(store)
    }

    /// Apply one drained journal batch in a single transaction. Ledger rows
    /// are append-only and keyed by (sponsor_id, entry_id), so replaying a
    /// batch after a partial failure never duplicates an entry.
    pub fn persist_delta(
        &mut self,
        config: &EngineConfig,
        records: &[JournalRecord],
    ) -> Result<(), PersistenceError> {
        let tx = self.conn.transaction()?;

        upsert_engine(&tx, config)?;

        for record in records {
            match record {
                JournalRecord::SponsorUpserted(sponsor) => {
                    let sponsor_json = serde_json::to_string(sponsor)?;
                    tx.execute(
                        "INSERT INTO sponsors (sponsor_id, status, sponsor_json, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?4)
                         ON CONFLICT(sponsor_id) DO UPDATE SET
                            status = excluded.status,
                            sponsor_json = excluded.sponsor_json,
                            updated_at = excluded.updated_at",
                        params![
                            sponsor.sponsor_id.as_str(),
                            format!("{:?}", sponsor.status).to_lowercase(),
                            sponsor_json,
                            sponsor.created_at,
                        ],
                    )?;
                }
                JournalRecord::LedgerAppended(entry) => {
                    let payload_json = serde_json::to_string(entry)?;
                    tx.execute(
                        "INSERT OR IGNORE INTO ledger_entries (
                            sponsor_id,
                            entry_id,
                            kind,
                            amount,
                            resulting_balance,
                            reference,
                            created_at,
                            payload_json
                         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                        params![
                            entry.sponsor_id.as_str(),
                            entry.entry_id.as_str(),
                            entry.kind.to_string(),
                            entry.amount,
                            entry.resulting_balance,
                            entry.reference.as_str(),
                            entry.created_at,
                            payload_json,
                        ],
                    )?;
                }
                JournalRecord::CampaignUpserted(campaign) => {
                    let campaign_json = serde_json::to_string(campaign)?;
                    tx.execute(
                        "INSERT INTO campaigns (
                            campaign_id,
                            sponsor_id,
                            placement,
                            status,
                            campaign_json,
                            updated_at
                         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT(campaign_id) DO UPDATE SET
                            placement = excluded.placement,
                            status = excluded.status,
                            campaign_json = excluded.campaign_json,
                            updated_at = excluded.updated_at",
                        params![
                            campaign.campaign_id.as_str(),
                            campaign.sponsor_id.as_str(),
                            campaign.placement.to_string(),
                            campaign.status.to_string(),
                            campaign_json,
                            campaign.created_at,
                        ],
                    )?;
                }
                JournalRecord::DepositUpserted(deposit) => {
                    let deposit_json = serde_json::to_string(deposit)?;
                    tx.execute(
                        "INSERT INTO deposits (
                            transaction_id,
                            sponsor_id,
                            state,
                            deposit_json,
                            updated_at
                         ) VALUES (?1, ?2, ?3, ?4, ?5)
                         ON CONFLICT(transaction_id) DO UPDATE SET
                            state = excluded.state,
                            deposit_json = excluded.deposit_json,
                            updated_at = excluded.updated_at",
                        params![
                            deposit.transaction_id.as_str(),
                            deposit.sponsor_id.as_str(),
                            format!("{:?}", deposit.state).to_lowercase(),
                            deposit_json,
                            deposit.decided_at.unwrap_or(deposit.created_at),
                        ],
                    )?;
                }
                JournalRecord::RateCardUpdated(card) => {
                    let card_json = serde_json::to_string(card)?;
                    tx.execute(
                        "INSERT OR IGNORE INTO rate_cards (version, card_json)
                         VALUES (?1, ?2)",
                        params![i64::try_from(card.version).unwrap_or(i64::MAX), card_json],
                    )?;
                }
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Load everything needed to rebuild an engine after a restart.
    pub fn load_state(
        &self,
        engine_id: &str,
    ) -> Result<Option<PersistedEngineState>, PersistenceError> {
        let config_json: Option<String> = self
            .conn
            .query_row(
                "SELECT config_json FROM engines WHERE engine_id = ?1",
                params![engine_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(raw_config) = config_json else {
            return Ok(None);
        };
        let config = serde_json::from_str::<EngineConfig>(&raw_config)?;

        let sponsors = self.load_json_column::<Sponsor>(
            "SELECT sponsor_json FROM sponsors ORDER BY sponsor_id ASC",
        )?;

        let mut ledgers: BTreeMap<String, Vec<LedgerEntry>> = BTreeMap::new();
        let mut stmt = self.conn.prepare(
            // entry_id is lexicographic; created_at leads so ordering holds
            // past the id zero-padding.
            "SELECT payload_json FROM ledger_entries
             ORDER BY sponsor_id ASC, created_at ASC, entry_id ASC",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for row in rows {
            let entry = serde_json::from_str::<LedgerEntry>(&row?)?;
            ledgers.entry(entry.sponsor_id.clone()).or_default().push(entry);
        }

        let campaigns = self.load_json_column::<Campaign>(
            "SELECT campaign_json FROM campaigns ORDER BY campaign_id ASC",
        )?;
        let deposits = self.load_json_column::<PendingDeposit>(
            "SELECT deposit_json FROM deposits ORDER BY transaction_id ASC",
        )?;

        let latest_card: Option<String> = self
            .conn
            .query_row(
                "SELECT card_json FROM rate_cards ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let rates = match latest_card {
            Some(raw) => serde_json::from_str::<RateCard>(&raw)?,
            None => config.initial_rates,
        };

        Ok(Some(PersistedEngineState {
            config,
            sponsors,
            ledgers,
            campaigns,
            deposits,
            rates,
        }))
    }

    pub fn load_ledger_range(
        &self,
        sponsor_id: &str,
        from_created: i64,
        to_created: i64,
    ) -> Result<Vec<LedgerEntry>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT payload_json
             FROM ledger_entries
             WHERE sponsor_id = ?1 AND created_at >= ?2 AND created_at <= ?3
             ORDER BY created_at ASC, entry_id ASC",
        )?;
        let rows = stmt.query_map(params![sponsor_id, from_created, to_created], |row| {
            row.get::<_, String>(0)
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(serde_json::from_str::<LedgerEntry>(&row?)?);
        }
        Ok(entries)
    }

    /// Daily burn aggregated straight from the persisted ledger, one row per
    /// (day, campaign) with at least one debit.
    pub fn daily_burn(
        &self,
        sponsor_id: &str,
        from_day: i64,
        to_day: i64,
    ) -> Result<Vec<DailyBurnRow>, PersistenceError> {
        let mut stmt = self.conn.prepare(
            "SELECT created_at / 86400 AS day, reference, SUM(-amount), COUNT(*)
             FROM ledger_entries
             WHERE sponsor_id = ?1
               AND kind = ?2
               AND created_at / 86400 >= ?3
               AND created_at / 86400 <= ?4
             GROUP BY day, reference
             ORDER BY day ASC, reference ASC",
        )?;
        let rows = stmt.query_map(
            params![
                sponsor_id,
                LedgerEntryKind::Debit.to_string(),
                from_day,
                to_day
            ],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, u64>(3)?,
                ))
            },
        )?;

        let mut report = Vec::new();
        for row in rows {
            let (day, campaign_id, debit_total, event_count) = row?;
            report.push(DailyBurnRow {
                day: reporting::day_string(day),
                campaign_id,
                debit_total,
                event_count,
            });
        }
        Ok(report)
    }

    fn load_json_column<T: serde::de::DeserializeOwned>(
        &self,
        sql: &str,
    ) -> Result<Vec<T>, PersistenceError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut values = Vec::new();
        for row in rows {
            values.push(serde_json::from_str::<T>(&row?)?);
        }
        Ok(values)
    }

    fn configure(&mut self) -> Result<(), PersistenceError> {
        self.conn.pragma_update(None, "journal_mode", "WAL")?;
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    fn migrate(&mut self) -> Result<(), PersistenceError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS engines (
                engine_id TEXT PRIMARY KEY,
                schema_version TEXT NOT NULL,
                config_json TEXT NOT NULL,
                seed TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS sponsors (
                sponsor_id TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                sponsor_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS ledger_entries (
                sponsor_id TEXT NOT NULL,
                entry_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                amount INTEGER NOT NULL,
                resulting_balance INTEGER NOT NULL,
                reference TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                payload_json TEXT NOT NULL,
                PRIMARY KEY (sponsor_id, entry_id)
            );

            CREATE TABLE IF NOT EXISTS campaigns (
                campaign_id TEXT PRIMARY KEY,
                sponsor_id TEXT NOT NULL,
                placement TEXT NOT NULL,
                status TEXT NOT NULL,
                campaign_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deposits (
                transaction_id TEXT PRIMARY KEY,
                sponsor_id TEXT NOT NULL,
                state TEXT NOT NULL,
                deposit_json TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS rate_cards (
                version INTEGER PRIMARY KEY,
                card_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_sponsor_created
                ON ledger_entries(sponsor_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_ledger_sponsor_kind
                ON ledger_entries(sponsor_id, kind, created_at);
            CREATE INDEX IF NOT EXISTS idx_campaigns_sponsor ON campaigns(sponsor_id);
            CREATE INDEX IF NOT EXISTS idx_deposits_sponsor_state ON deposits(sponsor_id, state);
            ",
        )?;

        self.conn.execute(
            "INSERT OR IGNORE INTO schema_migrations(version, name, applied_at)
             VALUES(1, 'initial_v1', 'epoch-0')",
            [],
        )?;

        Ok(())
    }
}

fn upsert_engine(
    tx: &rusqlite::Transaction<'_>,
    config: &EngineConfig,
) -> Result<(), PersistenceError> {
    let config_json = serde_json::to_string(config)?;

    tx.execute(
        "INSERT INTO engines (engine_id, schema_version, config_json, seed, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0)
         ON CONFLICT(engine_id) DO UPDATE SET
            schema_version = excluded.schema_version,
            config_json = excluded.config_json,
            seed = excluded.seed",
        params![
            config.engine_id.as_str(),
            config.schema_version.as_str(),
            config_json,
            config.seed.to_string(),
        ],
    )?;

    Ok(())
}
