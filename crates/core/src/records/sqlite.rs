//! SQLite-backed record store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{
    Category, CreateTicketRecord, GuildSettings, RecordStore, StoreError, Survey, Ticket,
    TicketQuery,
};

/// SQLite-backed record store.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
}

impl SqliteRecordStore {
    /// Create a new SQLite record store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite record store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                guild TEXT NOT NULL,
                name TEXT NOT NULL,
                max_per_member INTEGER NOT NULL DEFAULT 1,
                claiming INTEGER NOT NULL DEFAULT 0,
                image TEXT,
                name_format TEXT NOT NULL,
                opening_message TEXT NOT NULL,
                opening_questions TEXT,
                ping TEXT,
                require_topic INTEGER NOT NULL DEFAULT 0,
                roles TEXT NOT NULL,
                survey TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_categories_guild ON categories(guild);

            CREATE TABLE IF NOT EXISTS tickets (
                id TEXT PRIMARY KEY,
                guild TEXT NOT NULL,
                number INTEGER NOT NULL,
                creator TEXT NOT NULL,
                category TEXT NOT NULL,
                topic TEXT,
                open INTEGER NOT NULL DEFAULT 1,
                claimed_by TEXT,
                opening_message TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_tickets_guild ON tickets(guild);
            CREATE INDEX IF NOT EXISTS idx_tickets_creator_category
                ON tickets(creator, category);

            CREATE TABLE IF NOT EXISTS surveys (
                guild TEXT NOT NULL,
                name TEXT NOT NULL,
                questions TEXT NOT NULL,
                PRIMARY KEY (guild, name)
            );

            CREATE TABLE IF NOT EXISTS settings (
                guild TEXT PRIMARY KEY,
                colour TEXT NOT NULL,
                command_prefix TEXT NOT NULL,
                error_colour TEXT NOT NULL,
                footer TEXT NOT NULL,
                locale TEXT NOT NULL,
                log_messages INTEGER NOT NULL,
                success_colour TEXT NOT NULL,
                tags TEXT NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn build_ticket_where(query: &TicketQuery) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref guild) = query.guild {
            conditions.push("guild = ?");
            params.push(Box::new(guild.clone()));
        }

        if let Some(ref category) = query.category {
            conditions.push("category = ?");
            params.push(Box::new(category.clone()));
        }

        if let Some(ref creator) = query.creator {
            conditions.push("creator = ?");
            params.push(Box::new(creator.clone()));
        }

        if let Some(open) = query.open {
            conditions.push("open = ?");
            params.push(Box::new(open));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    fn row_to_category(row: &rusqlite::Row) -> rusqlite::Result<Category> {
        let roles_json: String = row.get(11)?;
        let questions_json: Option<String> = row.get(8)?;

        Ok(Category {
            id: row.get(0)?,
            guild: row.get(1)?,
            name: row.get(2)?,
            max_per_member: row.get(3)?,
            claiming: row.get(4)?,
            image: row.get(5)?,
            name_format: row.get(6)?,
            opening_message: row.get(7)?,
            opening_questions: questions_json
                .and_then(|json| serde_json::from_str(&json).ok()),
            ping: row.get(9)?,
            require_topic: row.get(10)?,
            roles: serde_json::from_str(&roles_json).unwrap_or_default(),
            survey: row.get(12)?,
        })
    }

    fn row_to_ticket(row: &rusqlite::Row) -> rusqlite::Result<Ticket> {
        let created_at_str: String = row.get(9)?;

        let created_at = DateTime::parse_from_rfc3339(&created_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Ticket {
            id: row.get(0)?,
            guild: row.get(1)?,
            number: row.get(2)?,
            creator: row.get(3)?,
            category: row.get(4)?,
            topic: row.get(5)?,
            open: row.get(6)?,
            claimed_by: row.get(7)?,
            opening_message: row.get(8)?,
            created_at,
        })
    }

    fn row_to_survey(row: &rusqlite::Row) -> rusqlite::Result<Survey> {
        let questions_json: String = row.get(2)?;
        Ok(Survey {
            guild: row.get(0)?,
            name: row.get(1)?,
            questions: serde_json::from_str(&questions_json).unwrap_or_default(),
        })
    }

    const CATEGORY_COLUMNS: &'static str = "id, guild, name, max_per_member, claiming, image, \
         name_format, opening_message, opening_questions, ping, require_topic, roles, survey";

    const TICKET_COLUMNS: &'static str =
        "id, guild, number, creator, category, topic, open, claimed_by, opening_message, created_at";
}

impl RecordStore for SqliteRecordStore {
    fn category(&self, id: &str) -> Result<Option<Category>, StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!(
                "SELECT {} FROM categories WHERE id = ?",
                Self::CATEGORY_COLUMNS
            ),
            params![id],
            Self::row_to_category,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn categories(&self, guild: &str) -> Result<Vec<Category>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM categories WHERE guild = ? ORDER BY rowid",
                Self::CATEGORY_COLUMNS
            ))
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![guild], Self::row_to_category)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut categories = Vec::new();
        for row in rows {
            categories.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(categories)
    }

    fn create_category(&self, category: &Category) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let roles_json = serde_json::to_string(&category.roles)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let questions_json = category
            .opening_questions
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        conn.execute(
            "INSERT INTO categories (id, guild, name, max_per_member, claiming, image, \
             name_format, opening_message, opening_questions, ping, require_topic, roles, survey) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                category.id,
                category.guild,
                category.name,
                category.max_per_member,
                category.claiming,
                category.image,
                category.name_format,
                category.opening_message,
                questions_json,
                category.ping,
                category.require_topic,
                roles_json,
                category.survey,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn update_category(&self, category: &Category) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let roles_json = serde_json::to_string(&category.roles)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let questions_json = category
            .opening_questions
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        let updated = conn
            .execute(
                "UPDATE categories SET guild = ?, name = ?, max_per_member = ?, claiming = ?, \
                 image = ?, name_format = ?, opening_message = ?, opening_questions = ?, \
                 ping = ?, require_topic = ?, roles = ?, survey = ? WHERE id = ?",
                params![
                    category.guild,
                    category.name,
                    category.max_per_member,
                    category.claiming,
                    category.image,
                    category.name_format,
                    category.opening_message,
                    questions_json,
                    category.ping,
                    category.require_topic,
                    roles_json,
                    category.survey,
                    category.id,
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!("category {}", category.id)));
        }

        Ok(())
    }

    fn create_ticket(&self, request: CreateTicketRecord) -> Result<Ticket, StoreError> {
        let conn = self.conn.lock().unwrap();

        let now = Utc::now();

        conn.execute(
            "INSERT INTO tickets (id, guild, number, creator, category, topic, open, \
             claimed_by, opening_message, created_at) VALUES (?, ?, ?, ?, ?, ?, 1, NULL, NULL, ?)",
            params![
                request.id,
                request.guild,
                request.number,
                request.creator,
                request.category,
                request.topic,
                now.to_rfc3339(),
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Ticket {
            id: request.id,
            guild: request.guild,
            number: request.number,
            creator: request.creator,
            category: request.category,
            topic: request.topic,
            open: true,
            claimed_by: None,
            opening_message: None,
            created_at: now,
        })
    }

    fn ticket(&self, id: &str) -> Result<Option<Ticket>, StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            &format!("SELECT {} FROM tickets WHERE id = ?", Self::TICKET_COLUMNS),
            params![id],
            Self::row_to_ticket,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn tickets(&self, query: &TicketQuery) -> Result<Vec<Ticket>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_ticket_where(query);

        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY number ASC",
            Self::TICKET_COLUMNS,
            where_clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_ticket)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut tickets = Vec::new();
        for row in rows {
            tickets.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(tickets)
    }

    fn count_tickets(&self, query: &TicketQuery) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();

        let (where_clause, params) = Self::build_ticket_where(query);

        let sql = format!("SELECT COUNT(*) FROM tickets {}", where_clause);

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        conn.query_row(&sql, param_refs.as_slice(), |row| row.get(0))
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn update_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let updated = conn
            .execute(
                "UPDATE tickets SET guild = ?, number = ?, creator = ?, category = ?, topic = ?, \
                 open = ?, claimed_by = ?, opening_message = ? WHERE id = ?",
                params![
                    ticket.guild,
                    ticket.number,
                    ticket.creator,
                    ticket.category,
                    ticket.topic,
                    ticket.open,
                    ticket.claimed_by,
                    ticket.opening_message,
                    ticket.id,
                ],
            )
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!("ticket {}", ticket.id)));
        }

        Ok(())
    }

    fn next_ticket_number(&self, guild: &str) -> Result<u32, StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT COALESCE(MAX(number), 0) + 1 FROM tickets WHERE guild = ?",
            params![guild],
            |row| row.get(0),
        )
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn survey(&self, guild: &str, name: &str) -> Result<Option<Survey>, StoreError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT guild, name, questions FROM surveys WHERE guild = ? AND name = ?",
            params![guild, name],
            Self::row_to_survey,
        )
        .optional()
        .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn surveys(&self, guild: &str) -> Result<Vec<Survey>, StoreError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare("SELECT guild, name, questions FROM surveys WHERE guild = ? ORDER BY name")
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(params![guild], Self::row_to_survey)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut surveys = Vec::new();
        for row in rows {
            surveys.push(row.map_err(|e| StoreError::Database(e.to_string()))?);
        }

        Ok(surveys)
    }

    fn upsert_survey(
        &self,
        guild: &str,
        name: &str,
        questions: &[String],
    ) -> Result<Survey, StoreError> {
        let conn = self.conn.lock().unwrap();

        let questions_json =
            serde_json::to_string(questions).map_err(|e| StoreError::Corrupt(e.to_string()))?;

        conn.execute(
            "INSERT INTO surveys (guild, name, questions) VALUES (?, ?, ?) \
             ON CONFLICT (guild, name) DO UPDATE SET questions = excluded.questions",
            params![guild, name, questions_json],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Survey {
            guild: guild.to_string(),
            name: name.to_string(),
            questions: questions.to_vec(),
        })
    }

    fn settings(&self, guild: &str) -> Result<GuildSettings, StoreError> {
        let conn = self.conn.lock().unwrap();

        let row = conn
            .query_row(
                "SELECT guild, colour, command_prefix, error_colour, footer, locale, \
                 log_messages, success_colour, tags FROM settings WHERE guild = ?",
                params![guild],
                |row| {
                    let tags_json: String = row.get(8)?;
                    Ok(GuildSettings {
                        guild: row.get(0)?,
                        colour: row.get(1)?,
                        command_prefix: row.get(2)?,
                        error_colour: row.get(3)?,
                        footer: row.get(4)?,
                        locale: row.get(5)?,
                        log_messages: row.get(6)?,
                        success_colour: row.get(7)?,
                        tags: serde_json::from_str(&tags_json).unwrap_or_default(),
                    })
                },
            )
            .optional()
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(row.unwrap_or_else(|| GuildSettings::defaults(guild)))
    }

    fn save_settings(&self, settings: &GuildSettings) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();

        let tags_json = serde_json::to_string(&settings.tags)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;

        conn.execute(
            "INSERT INTO settings (guild, colour, command_prefix, error_colour, footer, locale, \
             log_messages, success_colour, tags) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (guild) DO UPDATE SET colour = excluded.colour, \
             command_prefix = excluded.command_prefix, error_colour = excluded.error_colour, \
             footer = excluded.footer, locale = excluded.locale, \
             log_messages = excluded.log_messages, success_colour = excluded.success_colour, \
             tags = excluded.tags",
            params![
                settings.guild,
                settings.colour,
                settings.command_prefix,
                settings.error_colour,
                settings.footer,
                settings.locale,
                settings.log_messages,
                settings.success_colour,
                tags_json,
            ],
        )
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(())
    }
}
