//! PostgreSQL adapter for conduct storage.
//!
//! The schema is a fixed, ordered list of migrations. `migrate` applies the
//! missing ones; `connect` refuses to serve a database whose recorded version
//! differs from [`SCHEMA_VERSION`].

use crate::traits::{ConductStore, ConductTx};
use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use conduct_types::{
    ClassId, ClassRef, ClassTermStatus, Criterion, CriterionId, CriterionKind, CriterionOption,
    HistorySnapshot, OptionId, Rank, SelfAssessmentRecord, StudentId, StudentRef, TermRef,
    TermScore, Tier,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::BTreeMap;

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: i32 = 1;

const MIGRATIONS: &[(i32, &[&str])] = &[(
    1,
    &[
        r#"
        CREATE TABLE IF NOT EXISTS faculties (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS classes (
            class_id BIGINT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            faculty_code TEXT NOT NULL REFERENCES faculties (code)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS students (
            student_id BIGINT PRIMARY KEY,
            code TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            class_id BIGINT NOT NULL REFERENCES classes (class_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS terms (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            starts_on DATE NOT NULL,
            is_open BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS criteria (
            criterion_id BIGINT PRIMARY KEY,
            term_code TEXT NOT NULL REFERENCES terms (code),
            code TEXT NOT NULL,
            title TEXT NOT NULL,
            kind TEXT NOT NULL,
            max_points INTEGER NOT NULL,
            requires_verification BOOLEAN NOT NULL DEFAULT FALSE,
            UNIQUE (term_code, code)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS criterion_options (
            option_id BIGINT PRIMARY KEY,
            criterion_id BIGINT NOT NULL REFERENCES criteria (criterion_id),
            label TEXT NOT NULL,
            points INTEGER NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS self_assessments (
            student_id BIGINT NOT NULL REFERENCES students (student_id),
            term_code TEXT NOT NULL REFERENCES terms (code),
            criterion_id BIGINT NOT NULL REFERENCES criteria (criterion_id),
            option_id BIGINT REFERENCES criterion_options (option_id),
            text_value TEXT,
            self_score INTEGER NOT NULL,
            is_verified BOOLEAN NOT NULL DEFAULT FALSE,
            participated BOOLEAN,
            verify_note TEXT,
            verified_by TEXT,
            verified_at TIMESTAMPTZ,
            updated_at TIMESTAMPTZ NOT NULL,
            UNIQUE (student_id, term_code, criterion_id)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS assessment_history (
            student_id BIGINT NOT NULL REFERENCES students (student_id),
            term_code TEXT NOT NULL REFERENCES terms (code),
            role TEXT NOT NULL,
            total_score INTEGER NOT NULL,
            changed_by TEXT NOT NULL,
            note TEXT,
            updated_at TIMESTAMPTZ NOT NULL,
            UNIQUE (student_id, term_code, role)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS class_term_status (
            class_id BIGINT NOT NULL REFERENCES classes (class_id),
            term_code TEXT NOT NULL REFERENCES terms (code),
            is_leader_approved BOOLEAN NOT NULL DEFAULT FALSE,
            leader_approved_at TIMESTAMPTZ,
            is_teacher_approved BOOLEAN NOT NULL DEFAULT FALSE,
            teacher_approved_at TIMESTAMPTZ,
            is_faculty_approved BOOLEAN NOT NULL DEFAULT FALSE,
            faculty_approved_at TIMESTAMPTZ,
            is_admin_approved BOOLEAN NOT NULL DEFAULT FALSE,
            admin_approved_at TIMESTAMPTZ,
            UNIQUE (class_id, term_code)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS term_scores (
            student_id BIGINT NOT NULL REFERENCES students (student_id),
            term_code TEXT NOT NULL REFERENCES terms (code),
            total_score INTEGER NOT NULL,
            rank TEXT NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            UNIQUE (student_id, term_code)
        )
        "#,
    ],
)];

const CREATE_MIGRATIONS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS schema_migrations (
        version INTEGER PRIMARY KEY,
        applied_at TIMESTAMPTZ NOT NULL
    )
"#;

const MIGRATIONS_TABLE_EXISTS: &str = "SELECT to_regclass('schema_migrations') IS NOT NULL";

const READ_SCHEMA_VERSION: &str = "SELECT MAX(version) FROM schema_migrations";

/// Migrations newer than `current`, in order. A database ahead of this build
/// is refused.
fn pending_migrations(current: i32) -> StorageResult<Vec<(i32, &'static [&'static str])>> {
    if current > SCHEMA_VERSION {
        return Err(StorageError::SchemaVersion {
            expected: SCHEMA_VERSION,
            found: current,
        });
    }
    Ok(MIGRATIONS
        .iter()
        .filter(|(version, _)| *version > current)
        .copied()
        .collect())
}

fn check_schema_version(found: i32) -> StorageResult<()> {
    if found != SCHEMA_VERSION {
        return Err(StorageError::SchemaVersion {
            expected: SCHEMA_VERSION,
            found,
        });
    }
    Ok(())
}

/// PostgreSQL-backed conduct storage.
#[derive(Clone)]
pub struct PostgresConductStore {
    pool: PgPool,
}

impl PostgresConductStore {
    /// Connect with default pool parameters and verify the schema version.
    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        Self::connect_with_options(database_url, 10, 5).await
    }

    /// Connect with explicit pool parameters and verify the schema version.
    pub async fn connect_with_options(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let store = Self::open(database_url, max_connections, connect_timeout_secs).await?;
        store.ensure_schema_version().await?;
        Ok(store)
    }

    /// Connect without checking the schema. Used by the migration command.
    pub async fn open(
        database_url: &str,
        max_connections: u32,
        connect_timeout_secs: u64,
    ) -> StorageResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(std::time::Duration::from_secs(connect_timeout_secs))
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Backend(format!("failed to connect postgres: {e}")))?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Version recorded in `schema_migrations`, 0 for an empty database.
    /// Read-only: a database without the table is reported, not altered.
    pub async fn schema_version(&self) -> StorageResult<i32> {
        let exists: bool = sqlx::query_scalar(MIGRATIONS_TABLE_EXISTS)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        if !exists {
            return Ok(0);
        }

        let version: Option<i32> = sqlx::query_scalar(READ_SCHEMA_VERSION)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        Ok(version.unwrap_or(0))
    }

    /// Apply every migration newer than the recorded version, each in its own
    /// transaction. Returns the resulting version.
    pub async fn migrate(&self) -> StorageResult<i32> {
        sqlx::query(CREATE_MIGRATIONS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Backend(format!("schema init failed: {e}")))?;

        let current = self.schema_version().await?;
        for (version, statements) in pending_migrations(current)? {
            let mut tx = self.pool.begin().await.map_err(backend)?;
            for stmt in statements.iter() {
                sqlx::query(stmt)
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| StorageError::Backend(format!("migration {version} failed: {e}")))?;
            }
            sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES ($1, $2)")
                .bind(version)
                .bind(Utc::now())
                .execute(&mut *tx)
                .await
                .map_err(backend)?;
            tx.commit().await.map_err(backend)?;
            tracing::info!(version, "Applied schema migration");
        }
        Ok(SCHEMA_VERSION)
    }

    async fn ensure_schema_version(&self) -> StorageResult<()> {
        check_schema_version(self.schema_version().await?)
    }
}

#[async_trait]
impl ConductStore for PostgresConductStore {
    async fn begin(&self) -> StorageResult<Box<dyn ConductTx>> {
        let tx = self.pool.begin().await.map_err(backend)?;
        Ok(Box::new(PostgresTx { tx }))
    }

    fn backend_label(&self) -> &'static str {
        "postgres"
    }
}

struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl ConductTx for PostgresTx {
    async fn find_student(&mut self, student_code: &str) -> StorageResult<Option<StudentRef>> {
        let row = sqlx::query(
            "SELECT student_id, code, full_name, class_id FROM students WHERE code = $1",
        )
        .bind(student_code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;
        row.map(student_row).transpose()
    }

    async fn find_class(&mut self, class_code: &str) -> StorageResult<Option<ClassRef>> {
        let row =
            sqlx::query("SELECT class_id, code, name, faculty_code FROM classes WHERE code = $1")
                .bind(class_code)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(backend)?;
        row.map(class_row).transpose()
    }

    async fn list_faculty_classes(&mut self, faculty_code: &str) -> StorageResult<Vec<ClassRef>> {
        let rows = sqlx::query(
            r#"
            SELECT class_id, code, name, faculty_code
              FROM classes
             WHERE faculty_code = $1
             ORDER BY code
            "#,
        )
        .bind(faculty_code)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(backend)?;
        rows.into_iter().map(class_row).collect()
    }

    async fn list_class_students(&mut self, class_id: ClassId) -> StorageResult<Vec<StudentRef>> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, code, full_name, class_id
              FROM students
             WHERE class_id = $1
             ORDER BY code
            "#,
        )
        .bind(class_id.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(backend)?;
        rows.into_iter().map(student_row).collect()
    }

    async fn find_term(&mut self, term_code: &str) -> StorageResult<Option<TermRef>> {
        let row = sqlx::query("SELECT code, name, starts_on, is_open FROM terms WHERE code = $1")
            .bind(term_code)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(backend)?;
        row.map(term_row).transpose()
    }

    async fn list_criteria(&mut self, term_code: &str) -> StorageResult<Vec<Criterion>> {
        let rows = sqlx::query(
            r#"
            SELECT criterion_id, term_code, code, title, kind, max_points, requires_verification
              FROM criteria
             WHERE term_code = $1
             ORDER BY criterion_id
            "#,
        )
        .bind(term_code)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(backend)?;

        let mut criteria = BTreeMap::new();
        for row in rows {
            let criterion = criterion_row(row)?;
            criteria.insert(criterion.id, criterion);
        }

        let option_rows = sqlx::query(
            r#"
            SELECT o.option_id, o.criterion_id, o.label, o.points
              FROM criterion_options o
              JOIN criteria c ON c.criterion_id = o.criterion_id
             WHERE c.term_code = $1
             ORDER BY o.option_id
            "#,
        )
        .bind(term_code)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(backend)?;

        for row in option_rows {
            let criterion_id = CriterionId(get(&row, "criterion_id")?);
            let option = CriterionOption {
                id: OptionId(get(&row, "option_id")?),
                label: get(&row, "label")?,
                points: get(&row, "points")?,
            };
            if let Some(criterion) = criteria.get_mut(&criterion_id) {
                criterion.options.push(option);
            }
        }

        Ok(criteria.into_values().collect())
    }

    async fn upsert_self_assessment(
        &mut self,
        record: &SelfAssessmentRecord,
    ) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO self_assessments
                (student_id, term_code, criterion_id, option_id, text_value, self_score,
                 is_verified, participated, verify_note, verified_by, verified_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (student_id, term_code, criterion_id) DO UPDATE
               SET option_id = EXCLUDED.option_id,
                   text_value = EXCLUDED.text_value,
                   self_score = EXCLUDED.self_score,
                   is_verified = EXCLUDED.is_verified,
                   participated = EXCLUDED.participated,
                   verify_note = EXCLUDED.verify_note,
                   verified_by = EXCLUDED.verified_by,
                   verified_at = EXCLUDED.verified_at,
                   updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.student_id.0)
        .bind(&record.term_code)
        .bind(record.criterion_id.0)
        .bind(record.option_id.map(|id| id.0))
        .bind(record.text_value.as_deref())
        .bind(record.self_score)
        .bind(record.is_verified)
        .bind(record.participated)
        .bind(record.verify_note.as_deref())
        .bind(record.verified_by.as_deref())
        .bind(record.verified_at)
        .bind(record.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_self_assessment(
        &mut self,
        student_id: StudentId,
        term_code: &str,
        criterion_id: CriterionId,
    ) -> StorageResult<Option<SelfAssessmentRecord>> {
        let row = sqlx::query(
            r#"
            SELECT student_id, term_code, criterion_id, option_id, text_value, self_score,
                   is_verified, participated, verify_note, verified_by, verified_at, updated_at
              FROM self_assessments
             WHERE student_id = $1 AND term_code = $2 AND criterion_id = $3
            "#,
        )
        .bind(student_id.0)
        .bind(term_code)
        .bind(criterion_id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;
        row.map(self_assessment_row).transpose()
    }

    async fn list_self_assessments(
        &mut self,
        student_id: StudentId,
        term_code: &str,
    ) -> StorageResult<Vec<SelfAssessmentRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, term_code, criterion_id, option_id, text_value, self_score,
                   is_verified, participated, verify_note, verified_by, verified_at, updated_at
              FROM self_assessments
             WHERE student_id = $1 AND term_code = $2
             ORDER BY criterion_id
            "#,
        )
        .bind(student_id.0)
        .bind(term_code)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(backend)?;
        rows.into_iter().map(self_assessment_row).collect()
    }

    async fn upsert_history(&mut self, snapshot: &HistorySnapshot) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO assessment_history
                (student_id, term_code, role, total_score, changed_by, note, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (student_id, term_code, role) DO UPDATE
               SET total_score = EXCLUDED.total_score,
                   changed_by = EXCLUDED.changed_by,
                   note = EXCLUDED.note,
                   updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(snapshot.student_id.0)
        .bind(&snapshot.term_code)
        .bind(snapshot.tier.as_str())
        .bind(snapshot.total_score)
        .bind(&snapshot.changed_by)
        .bind(snapshot.note.as_deref())
        .bind(snapshot.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn list_student_history(
        &mut self,
        student_id: StudentId,
        term_code: &str,
    ) -> StorageResult<Vec<HistorySnapshot>> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, term_code, role, total_score, changed_by, note, updated_at
              FROM assessment_history
             WHERE student_id = $1 AND term_code = $2
            "#,
        )
        .bind(student_id.0)
        .bind(term_code)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(backend)?;
        rows.into_iter().map(history_row).collect()
    }

    async fn get_class_status(
        &mut self,
        class_id: ClassId,
        term_code: &str,
    ) -> StorageResult<Option<ClassTermStatus>> {
        let row = sqlx::query(
            r#"
            SELECT class_id, term_code,
                   is_leader_approved, leader_approved_at,
                   is_teacher_approved, teacher_approved_at,
                   is_faculty_approved, faculty_approved_at,
                   is_admin_approved, admin_approved_at
              FROM class_term_status
             WHERE class_id = $1 AND term_code = $2
            "#,
        )
        .bind(class_id.0)
        .bind(term_code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;
        row.map(status_row).transpose()
    }

    async fn lock_gate(
        &mut self,
        class_id: ClassId,
        term_code: &str,
        tier: Tier,
        at: DateTime<Utc>,
    ) -> StorageResult<bool> {
        let (flag, stamp) = gate_columns(tier)?;
        // The WHERE on the conflict branch makes this a compare-and-set: a
        // gate that is already true matches no row.
        let sql = format!(
            r#"
            INSERT INTO class_term_status (class_id, term_code, {flag}, {stamp})
            VALUES ($1, $2, TRUE, $3)
            ON CONFLICT (class_id, term_code) DO UPDATE
               SET {flag} = TRUE,
                   {stamp} = EXCLUDED.{stamp}
             WHERE class_term_status.{flag} = FALSE
            "#
        );
        let result = sqlx::query(&sql)
            .bind(class_id.0)
            .bind(term_code)
            .bind(at)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn upsert_term_score(&mut self, score: &TermScore) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO term_scores (student_id, term_code, total_score, rank, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (student_id, term_code) DO UPDATE
               SET total_score = EXCLUDED.total_score,
                   rank = EXCLUDED.rank,
                   updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(score.student_id.0)
        .bind(&score.term_code)
        .bind(score.total_score)
        .bind(score.rank.label())
        .bind(score.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn get_term_score(
        &mut self,
        student_id: StudentId,
        term_code: &str,
    ) -> StorageResult<Option<TermScore>> {
        let row = sqlx::query(
            r#"
            SELECT student_id, term_code, total_score, rank, updated_at
              FROM term_scores
             WHERE student_id = $1 AND term_code = $2
            "#,
        )
        .bind(student_id.0)
        .bind(term_code)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(backend)?;
        row.map(|r| term_score_row(&r)).transpose()
    }

    async fn list_term_scores(
        &mut self,
        student_id: StudentId,
    ) -> StorageResult<Vec<(TermScore, TermRef)>> {
        let rows = sqlx::query(
            r#"
            SELECT s.student_id, s.term_code, s.total_score, s.rank, s.updated_at,
                   t.code, t.name, t.starts_on, t.is_open
              FROM term_scores s
              JOIN terms t ON t.code = s.term_code
             WHERE s.student_id = $1
             ORDER BY t.starts_on DESC, t.code DESC
            "#,
        )
        .bind(student_id.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(backend)?;
        rows.into_iter()
            .map(|row| Ok((term_score_row(&row)?, term_row(row)?)))
            .collect()
    }

    async fn commit(self: Box<Self>) -> StorageResult<()> {
        self.tx.commit().await.map_err(backend)
    }
}

fn gate_columns(tier: Tier) -> StorageResult<(&'static str, &'static str)> {
    match tier {
        Tier::Student => Err(StorageError::InvalidInput(
            "tier student has no approval gate".to_string(),
        )),
        Tier::Leader => Ok(("is_leader_approved", "leader_approved_at")),
        Tier::Teacher => Ok(("is_teacher_approved", "teacher_approved_at")),
        Tier::Faculty => Ok(("is_faculty_approved", "faculty_approved_at")),
        Tier::Admin => Ok(("is_admin_approved", "admin_approved_at")),
    }
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> StorageResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StorageError::Backend(e.to_string()))
}

fn student_row(row: PgRow) -> StorageResult<StudentRef> {
    Ok(StudentRef {
        id: StudentId(get(&row, "student_id")?),
        code: get(&row, "code")?,
        full_name: get(&row, "full_name")?,
        class_id: ClassId(get(&row, "class_id")?),
    })
}

fn class_row(row: PgRow) -> StorageResult<ClassRef> {
    Ok(ClassRef {
        id: ClassId(get(&row, "class_id")?),
        code: get(&row, "code")?,
        name: get(&row, "name")?,
        faculty_code: get(&row, "faculty_code")?,
    })
}

fn term_row(row: PgRow) -> StorageResult<TermRef> {
    let starts_on: NaiveDate = get(&row, "starts_on")?;
    Ok(TermRef {
        code: get(&row, "code")?,
        name: get(&row, "name")?,
        starts_on,
        is_open: get(&row, "is_open")?,
    })
}

fn criterion_row(row: PgRow) -> StorageResult<Criterion> {
    let kind: String = get(&row, "kind")?;
    Ok(Criterion {
        id: CriterionId(get(&row, "criterion_id")?),
        term_code: get(&row, "term_code")?,
        code: get(&row, "code")?,
        title: get(&row, "title")?,
        kind: CriterionKind::parse(&kind).ok_or_else(|| {
            StorageError::Serialization(format!("unknown criterion kind `{kind}`"))
        })?,
        max_points: get(&row, "max_points")?,
        requires_verification: get(&row, "requires_verification")?,
        options: Vec::new(),
    })
}

fn self_assessment_row(row: PgRow) -> StorageResult<SelfAssessmentRecord> {
    let option_id: Option<i64> = get(&row, "option_id")?;
    Ok(SelfAssessmentRecord {
        student_id: StudentId(get(&row, "student_id")?),
        term_code: get(&row, "term_code")?,
        criterion_id: CriterionId(get(&row, "criterion_id")?),
        option_id: option_id.map(OptionId),
        text_value: get(&row, "text_value")?,
        self_score: get(&row, "self_score")?,
        is_verified: get(&row, "is_verified")?,
        participated: get(&row, "participated")?,
        verify_note: get(&row, "verify_note")?,
        verified_by: get(&row, "verified_by")?,
        verified_at: get(&row, "verified_at")?,
        updated_at: get(&row, "updated_at")?,
    })
}

fn history_row(row: PgRow) -> StorageResult<HistorySnapshot> {
    let role: String = get(&row, "role")?;
    Ok(HistorySnapshot {
        student_id: StudentId(get(&row, "student_id")?),
        term_code: get(&row, "term_code")?,
        tier: role
            .parse()
            .map_err(|e: conduct_types::ParseTierError| StorageError::Serialization(e.to_string()))?,
        total_score: get(&row, "total_score")?,
        changed_by: get(&row, "changed_by")?,
        note: get(&row, "note")?,
        updated_at: get(&row, "updated_at")?,
    })
}

fn status_row(row: PgRow) -> StorageResult<ClassTermStatus> {
    Ok(ClassTermStatus {
        class_id: ClassId(get(&row, "class_id")?),
        term_code: get(&row, "term_code")?,
        is_leader_approved: get(&row, "is_leader_approved")?,
        leader_approved_at: get(&row, "leader_approved_at")?,
        is_teacher_approved: get(&row, "is_teacher_approved")?,
        teacher_approved_at: get(&row, "teacher_approved_at")?,
        is_faculty_approved: get(&row, "is_faculty_approved")?,
        faculty_approved_at: get(&row, "faculty_approved_at")?,
        is_admin_approved: get(&row, "is_admin_approved")?,
        admin_approved_at: get(&row, "admin_approved_at")?,
    })
}

fn term_score_row(row: &PgRow) -> StorageResult<TermScore> {
    let rank: String = get(row, "rank")?;
    Ok(TermScore {
        student_id: StudentId(get(row, "student_id")?),
        term_code: get(row, "term_code")?,
        total_score: get(row, "total_score")?,
        rank: rank.parse::<Rank>().map_err(StorageError::Serialization)?,
        updated_at: get(row, "updated_at")?,
    })
}

fn backend(err: sqlx::Error) -> StorageError {
    StorageError::Backend(err.to_string())
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23505") => return StorageError::Conflict(db_err.message().to_string()),
            Some("23503") => {
                return StorageError::InvalidReference(db_err.message().to_string())
            }
            _ => {}
        }
    }
    StorageError::Backend(err.to_string())
}
