//! SQL schema for the Fidelis SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id         TEXT PRIMARY KEY,
    email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
    first_name      TEXT,
    last_name       TEXT,
    phone           TEXT,
    role            TEXT NOT NULL DEFAULT 'CLIENT',  -- 'CLIENT' | 'EMPLOYEE' | 'ADMIN'
    password_hash   TEXT,                            -- argon2 PHC string
    -- Cached sum of fidelity_ledger_entries.points for this user.
    fidelity_points INTEGER NOT NULL DEFAULT 0 CHECK (fidelity_points >= 0),
    created_at      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS orders (
    order_id       TEXT PRIMARY KEY,
    order_number   TEXT NOT NULL UNIQUE,
    user_id        TEXT NOT NULL REFERENCES users(user_id),
    total          TEXT NOT NULL,   -- decimal TND, e.g. '200.000'
    status         TEXT NOT NULL,
    payment_status TEXT NOT NULL,
    created_at     TEXT NOT NULL,
    delivered_at   TEXT
);

-- Ledger entries are strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS fidelity_ledger_entries (
    seq         INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id    TEXT NOT NULL UNIQUE,
    user_id     TEXT NOT NULL REFERENCES users(user_id),
    points      INTEGER NOT NULL,
    entry_type  TEXT NOT NULL,
    description TEXT NOT NULL,
    reference   TEXT,
    order_id    TEXT REFERENCES orders(order_id),
    created_by  TEXT REFERENCES users(user_id),
    created_at  TEXT NOT NULL   -- RFC 3339 UTC, fixed microsecond width
);

-- At most one accrual and one reversal per order.
CREATE UNIQUE INDEX IF NOT EXISTS ledger_order_once_idx
    ON fidelity_ledger_entries(order_id, entry_type)
    WHERE entry_type IN ('EARNED_PURCHASE', 'REFUND');

CREATE INDEX IF NOT EXISTS ledger_user_history_idx
    ON fidelity_ledger_entries(user_id, created_at DESC, seq DESC);
CREATE INDEX IF NOT EXISTS orders_user_idx ON orders(user_id);

PRAGMA user_version = 1;
";
