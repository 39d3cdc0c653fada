//! [`SqliteStore`] — the SQLite implementation of [`LedgerStore`].

use std::path::Path;

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use fidelis_core::{
  Error as LedgerError,
  accrual::{is_points_eligible, plan_accrual, plan_refund},
  balance::Reconciliation,
  entry::{EntryType, LedgerEntry, NewEntry},
  order::{NewOrder, Order, OrderStatus, OrderUpdate},
  page::{Page, PageRequest, Pagination},
  store::{LedgerStore, MemberQuery, OrderWrite},
  user::{NewUser, User},
};

use crate::{
  Error, Result,
  encode::{
    ENTRY_SELECT, ORDER_COLUMNS, RawEntry, RawOrder, RawUser, USER_COLUMNS, decode_uuid,
    encode_decimal, encode_dt, encode_uuid, now,
  },
  schema::SCHEMA,
};

/// What a connection closure hands back: either a database failure, or a
/// value / rule violation decided inside the transaction.
type Outcome<T> = std::result::Result<Result<T>, tokio_rusqlite::Error>;

/// Same as [`Outcome`] for helpers that run inside a caller's transaction.
type TxOutcome<T> = rusqlite::Result<Result<T>>;

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(f, _)
      if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

/// `%term%` with LIKE wildcards in `term` escaped by `\`.
fn like_pattern(term: &str) -> String {
  let mut out = String::with_capacity(term.len() + 2);
  out.push('%');
  for c in term.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A fidelity ledger backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    tracing::debug!("schema initialised");
    Ok(())
  }

  /// Overwrite a cached balance without a ledger entry, to simulate drift.
  #[cfg(test)]
  pub(crate) async fn force_balance(&self, user_id: Uuid, points: i64) -> Result<()> {
    let id_str = encode_uuid(user_id);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE users SET fidelity_points = ?1 WHERE user_id = ?2",
          rusqlite::params![points, id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

fn read_entry(conn: &rusqlite::Connection, seq: i64) -> rusqlite::Result<RawEntry> {
  conn.query_row(
    &format!("{ENTRY_SELECT} WHERE e.seq = ?1"),
    rusqlite::params![seq],
    RawEntry::from_row,
  )
}

fn read_reconciliation(
  conn: &rusqlite::Connection,
  user_id: &str,
) -> rusqlite::Result<Option<(i64, i64)>> {
  conn
    .query_row(
      "SELECT u.fidelity_points,
              (SELECT COALESCE(SUM(e.points), 0)
                 FROM fidelity_ledger_entries e
                WHERE e.user_id = u.user_id)
         FROM users u
        WHERE u.user_id = ?1",
      rusqlite::params![user_id],
      |r| Ok((r.get(0)?, r.get(1)?)),
    )
    .optional()
}

// ─── Entries ─────────────────────────────────────────────────────────────────

/// A [`NewEntry`] encoded for its columns.
struct EntryRow {
  entry_id:    String,
  user_id:     Uuid,
  user_str:    String,
  order_id:    Option<Uuid>,
  order_str:   Option<String>,
  creator_str: Option<String>,
  entry_type:  EntryType,
  type_str:    String,
  points:      i64,
  description: String,
  reference:   Option<String>,
  at_str:      String,
}

impl EntryRow {
  fn new(entry: NewEntry) -> Self {
    Self {
      entry_id:    encode_uuid(Uuid::new_v4()),
      user_id:     entry.user_id,
      user_str:    encode_uuid(entry.user_id),
      order_id:    entry.order_id,
      order_str:   entry.order_id.map(encode_uuid),
      creator_str: entry.created_by.map(encode_uuid),
      entry_type:  entry.entry_type,
      type_str:    entry.entry_type.as_ref().to_owned(),
      points:      entry.points,
      description: entry.description,
      reference:   entry.reference,
      at_str:      encode_dt(now()),
    }
  }
}

/// Append `row` and move its owner's balance by `row.points`.
///
/// Runs under a savepoint of `tx`, so a refused entry leaves nothing behind
/// even when the caller goes on to commit.
fn insert_entry(tx: &mut rusqlite::Transaction<'_>, row: &EntryRow) -> TxOutcome<RawEntry> {
  let sp = tx.savepoint()?;

  let balance: Option<i64> = sp
    .query_row(
      "SELECT fidelity_points FROM users WHERE user_id = ?1",
      rusqlite::params![row.user_str],
      |r| r.get(0),
    )
    .optional()?;
  let Some(balance) = balance else {
    return Ok(Err(LedgerError::UserNotFound(row.user_id).into()));
  };
  if balance.checked_add(row.points).is_none() {
    return Ok(Err(
      LedgerError::Validation(format!(
        "balance of user {} cannot hold {} more points",
        row.user_id, row.points
      ))
      .into(),
    ));
  }

  if let (Some(order_id), Some(order_str)) = (row.order_id, row.order_str.as_ref()) {
    let owner: Option<String> = sp
      .query_row(
        "SELECT user_id FROM orders WHERE order_id = ?1",
        rusqlite::params![order_str],
        |r| r.get(0),
      )
      .optional()?;
    match owner {
      None => return Ok(Err(LedgerError::OrderNotFound(order_id).into())),
      Some(owner) if owner != row.user_str => {
        return Ok(Err(
          LedgerError::Validation(format!(
            "order {order_id} does not belong to user {}",
            row.user_id
          ))
          .into(),
        ));
      }
      Some(_) => {}
    }
  }

  let duplicate = |order_id: Uuid| -> Error {
    match row.entry_type {
      EntryType::Refund => LedgerError::DuplicateRefund(order_id).into(),
      _ => LedgerError::DuplicateAccrual(order_id).into(),
    }
  };

  if let (true, Some(order_id)) = (row.entry_type.is_order_bound(), row.order_id) {
    let exists = sp
      .query_row(
        "SELECT 1 FROM fidelity_ledger_entries
         WHERE order_id = ?1 AND entry_type = ?2",
        rusqlite::params![row.order_str, row.type_str],
        |_| Ok(()),
      )
      .optional()?
      .is_some();
    if exists {
      return Ok(Err(duplicate(order_id)));
    }
  }

  // Guarded increment: the balance can never be driven below zero,
  // whatever was read above.
  let moved = sp.execute(
    "UPDATE users SET fidelity_points = fidelity_points + ?1
     WHERE user_id = ?2 AND fidelity_points + ?1 >= 0",
    rusqlite::params![row.points, row.user_str],
  )?;
  if moved == 0 {
    return Ok(Err(
      LedgerError::InsufficientBalance {
        user_id: row.user_id,
        balance,
        delta: row.points,
      }
      .into(),
    ));
  }

  let res = sp.execute(
    "INSERT INTO fidelity_ledger_entries (
       entry_id, user_id, points, entry_type, description,
       reference, order_id, created_by, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      row.entry_id, row.user_str, row.points, row.type_str, row.description,
      row.reference, row.order_str, row.creator_str, row.at_str,
    ],
  );
  match (res, row.order_id) {
    (Ok(_), _) => {}
    (Err(e), Some(order_id)) if is_unique_violation(&e) => {
      return Ok(Err(duplicate(order_id)));
    }
    (Err(e), _) => return Err(e),
  }

  let raw = read_entry(&sp, sp.last_insert_rowid())?;
  sp.commit()?;
  Ok(Ok(raw))
}

/// Entries an order write appended, still in column form.
#[derive(Default)]
struct Settlement {
  credited:         Option<RawEntry>,
  reversed:         Option<RawEntry>,
  reversal_skipped: Option<LedgerError>,
}

impl Settlement {
  fn into_write(self, order: Order) -> Result<OrderWrite> {
    Ok(OrderWrite {
      order,
      credited: self.credited.map(RawEntry::into_entry).transpose()?,
      reversed: self.reversed.map(RawEntry::into_entry).transpose()?,
      reversal_skipped: self.reversal_skipped,
    })
  }
}

/// Credit or reverse `order`'s points according to its current state.
fn settle(tx: &mut rusqlite::Transaction<'_>, order: &Order) -> TxOutcome<Settlement> {
  let mut settlement = Settlement::default();

  if is_points_eligible(order.status, order.payment_status) {
    let entry = match plan_accrual(order) {
      Ok(entry) => entry,
      Err(e) => return Ok(Err(e.into())),
    };
    match insert_entry(tx, &EntryRow::new(entry))? {
      Ok(raw) => settlement.credited = Some(raw),
      Err(Error::Ledger(LedgerError::DuplicateAccrual(_))) => {}
      Err(e) => return Ok(Err(e)),
    }
  } else if order.is_reversed() {
    let earned: Option<i64> = tx
      .query_row(
        "SELECT points FROM fidelity_ledger_entries
         WHERE order_id = ?1 AND entry_type = ?2",
        rusqlite::params![encode_uuid(order.id), EntryType::EarnedPurchase.as_ref()],
        |r| r.get(0),
      )
      .optional()?;
    if let Some(earned) = earned.filter(|p| *p > 0) {
      match insert_entry(tx, &EntryRow::new(plan_refund(order, earned)))? {
        Ok(raw) => settlement.reversed = Some(raw),
        Err(Error::Ledger(LedgerError::DuplicateRefund(_))) => {}
        Err(Error::Ledger(err @ LedgerError::InsufficientBalance { .. })) => {
          settlement.reversal_skipped = Some(err);
        }
        Err(e) => return Ok(Err(e)),
      }
    }
  }

  Ok(Ok(settlement))
}

// ─── LedgerStore impl ────────────────────────────────────────────────────────

impl LedgerStore for SqliteStore {
  type Error = crate::Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<User> {
    let email = input.email.trim().to_owned();
    if email.is_empty() {
      return Err(LedgerError::Validation("email is required".into()).into());
    }

    let user = User {
      id:              Uuid::new_v4(),
      email:           email.clone(),
      first_name:      input.first_name,
      last_name:       input.last_name,
      phone:           input.phone,
      role:            input.role,
      fidelity_points: 0,
      created_at:      now(),
    };

    let id_str     = encode_uuid(user.id);
    let at_str     = encode_dt(user.created_at);
    let role_str   = user.role.as_ref().to_owned();
    let first_name = user.first_name.clone();
    let last_name  = user.last_name.clone();
    let phone      = user.phone.clone();
    let hash       = input.password_hash;
    let email_col  = email.clone();

    let inserted: bool = self
      .conn
      .call(move |conn| {
        let res = conn.execute(
          "INSERT INTO users (
             user_id, email, first_name, last_name, phone, role,
             password_hash, fidelity_points, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
          rusqlite::params![
            id_str, email_col, first_name, last_name, phone, role_str, hash, at_str,
          ],
        );
        match res {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(LedgerError::DuplicateEmail(email).into());
    }
    Ok(user)
  }

  async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawUser> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
            rusqlite::params![id_str],
            RawUser::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawUser::into_user).transpose()
  }

  async fn find_credentials(&self, email: &str) -> Result<Option<(User, String)>> {
    let email = email.trim().to_owned();

    let raw: Option<(RawUser, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!(
              "SELECT {USER_COLUMNS}, password_hash FROM users
               WHERE email = ?1 AND password_hash IS NOT NULL"
            ),
            rusqlite::params![email],
            |row| Ok((RawUser::from_row(row)?, row.get(8)?)),
          )
          .optional()?)
      })
      .await?;

    raw
      .map(|(u, hash)| u.into_user().map(|u| (u, hash)))
      .transpose()
  }

  async fn list_members(&self, query: &MemberQuery) -> Result<Page<User>> {
    let pattern = query
      .search
      .as_deref()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(like_pattern);
    let limit   = i64::from(query.page.limit);
    let offset  = query.page.offset();

    let (raws, total): (Vec<RawUser>, i64) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let filter = "?1 IS NULL
          OR email      LIKE ?1 ESCAPE '\\'
          OR first_name LIKE ?1 ESCAPE '\\'
          OR last_name  LIKE ?1 ESCAPE '\\'
          OR phone      LIKE ?1 ESCAPE '\\'";

        let total: i64 = tx.query_row(
          &format!("SELECT COUNT(*) FROM users WHERE {filter}"),
          rusqlite::params![pattern],
          |r| r.get(0),
        )?;

        let rows = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE {filter}
             ORDER BY fidelity_points DESC, created_at ASC, user_id ASC
             LIMIT ?2 OFFSET ?3"
          ))?;
          stmt
            .query_map(rusqlite::params![pattern, limit, offset], RawUser::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.commit()?;
        Ok((rows, total))
      })
      .await?;

    let items = raws
      .into_iter()
      .map(RawUser::into_user)
      .collect::<Result<Vec<_>>>()?;

    Ok(Page {
      items,
      pagination: Pagination::new(&query.page, total.max(0) as u64, None),
    })
  }

  // ── Orders ────────────────────────────────────────────────────────────────

  async fn create_order(&self, input: NewOrder) -> Result<OrderWrite> {
    let created_at = now();
    let order = Order {
      id:             Uuid::new_v4(),
      order_number:   input.order_number.trim().to_owned(),
      user_id:        input.user_id,
      total:          input.total,
      status:         input.status,
      payment_status: input.payment_status,
      created_at,
      delivered_at:   (input.status == OrderStatus::Delivered).then_some(created_at),
    };

    let id_str       = encode_uuid(order.id);
    let number       = order.order_number.clone();
    let user_id      = order.user_id;
    let user_str     = encode_uuid(user_id);
    let total_str    = encode_decimal(order.total);
    let status_str   = order.status.as_ref().to_owned();
    let payment_str  = order.payment_status.as_ref().to_owned();
    let at_str       = encode_dt(created_at);
    let delivered_at = order.delivered_at.map(encode_dt);
    let written      = order.clone();

    let settlement: Settlement = self
      .conn
      .call(move |conn| -> Outcome<Settlement> {
        let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let user_exists = tx
          .query_row(
            "SELECT 1 FROM users WHERE user_id = ?1",
            rusqlite::params![user_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !user_exists {
          return Ok(Err(LedgerError::UserNotFound(user_id).into()));
        }

        let res = tx.execute(
          "INSERT INTO orders (
             order_id, order_number, user_id, total, status,
             payment_status, created_at, delivered_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
          rusqlite::params![
            id_str, number, user_str, total_str, status_str, payment_str, at_str,
            delivered_at,
          ],
        );
        match res {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            return Ok(Err(LedgerError::DuplicateOrderNumber(number).into()));
          }
          Err(e) => return Err(e.into()),
        }

        // Dropping `tx` on a refused credit rolls the order back as well.
        let settlement = match settle(&mut tx, &written)? {
          Ok(settlement) => settlement,
          Err(e) => return Ok(Err(e)),
        };
        tx.commit()?;
        Ok(Ok(settlement))
      })
      .await??;

    settlement.into_write(order)
  }

  async fn get_order(&self, id: Uuid) -> Result<Option<Order>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawOrder> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"),
            rusqlite::params![id_str],
            RawOrder::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawOrder::into_order).transpose()
  }

  async fn update_order(&self, id: Uuid, update: OrderUpdate) -> Result<OrderWrite> {
    let id_str      = encode_uuid(id);
    let status      = update.status.map(|s| s.as_ref().to_owned());
    let payment     = update.payment_status.map(|s| s.as_ref().to_owned());
    let at_str      = encode_dt(now());
    let delivered   = OrderStatus::Delivered.as_ref().to_owned();

    let (order, settlement): (Order, Settlement) = self
      .conn
      .call(move |conn| -> Outcome<(Order, Settlement)> {
        let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let changed = tx.execute(
          "UPDATE orders SET
             status         = COALESCE(?2, status),
             payment_status = COALESCE(?3, payment_status),
             delivered_at   = CASE
                                WHEN delivered_at IS NULL AND COALESCE(?2, status) = ?4
                                THEN ?5
                                ELSE delivered_at
                              END
           WHERE order_id = ?1",
          rusqlite::params![id_str, status, payment, delivered, at_str],
        )?;
        if changed == 0 {
          return Ok(Err(LedgerError::OrderNotFound(id).into()));
        }

        let raw = tx.query_row(
          &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE order_id = ?1"),
          rusqlite::params![id_str],
          RawOrder::from_row,
        )?;
        let order = match raw.into_order() {
          Ok(order) => order,
          Err(e) => return Ok(Err(e)),
        };

        let settlement = match settle(&mut tx, &order)? {
          Ok(settlement) => settlement,
          Err(e) => return Ok(Err(e)),
        };
        tx.commit()?;
        Ok(Ok((order, settlement)))
      })
      .await??;

    settlement.into_write(order)
  }

  // ── Ledger ────────────────────────────────────────────────────────────────

  async fn append(&self, entry: NewEntry) -> Result<LedgerEntry> {
    if entry.entry_type.is_order_bound() && entry.order_id.is_none() {
      return Err(
        LedgerError::Validation(format!("{} entries must reference an order", entry.entry_type))
          .into(),
      );
    }
    let row = EntryRow::new(entry);

    let raw: RawEntry = self
      .conn
      .call(move |conn| -> Outcome<RawEntry> {
        let mut tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = match insert_entry(&mut tx, &row)? {
          Ok(raw) => raw,
          Err(e) => return Ok(Err(e)),
        };
        tx.commit()?;
        Ok(Ok(raw))
      })
      .await??;

    raw.into_entry()
  }

  async fn order_entry(&self, order_id: Uuid, entry_type: EntryType) -> Result<Option<LedgerEntry>> {
    let order_str = encode_uuid(order_id);
    let type_str  = entry_type.as_ref().to_owned();

    let raw: Option<RawEntry> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("{ENTRY_SELECT} WHERE e.order_id = ?1 AND e.entry_type = ?2"),
            rusqlite::params![order_str, type_str],
            RawEntry::from_row,
          )
          .optional()?)
      })
      .await?;

    raw.map(RawEntry::into_entry).transpose()
  }

  async fn history(&self, user_id: Uuid, page: PageRequest) -> Result<Page<LedgerEntry>> {
    let user_str = encode_uuid(user_id);
    let limit    = i64::from(page.limit);
    let offset   = page.offset();
    let pinned   = page.snapshot;

    let (raws, total, snapshot): (Vec<RawEntry>, i64, i64) = self
      .conn
      .call(move |conn| -> Outcome<(Vec<RawEntry>, i64, i64)> {
        // One read transaction: count, cursor and rows see the same data.
        let tx = conn.transaction()?;

        let exists = tx
          .query_row(
            "SELECT 1 FROM users WHERE user_id = ?1",
            rusqlite::params![user_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(Err(LedgerError::UserNotFound(user_id).into()));
        }

        let snapshot: i64 = match pinned {
          Some(s) => s,
          None => tx.query_row(
            "SELECT COALESCE(MAX(seq), 0) FROM fidelity_ledger_entries WHERE user_id = ?1",
            rusqlite::params![user_str],
            |r| r.get(0),
          )?,
        };

        let total: i64 = tx.query_row(
          "SELECT COUNT(*) FROM fidelity_ledger_entries WHERE user_id = ?1 AND seq <= ?2",
          rusqlite::params![user_str, snapshot],
          |r| r.get(0),
        )?;

        let rows = {
          let mut stmt = tx.prepare(&format!(
            "{ENTRY_SELECT}
             WHERE e.user_id = ?1 AND e.seq <= ?2
             ORDER BY e.created_at DESC, e.seq DESC
             LIMIT ?3 OFFSET ?4"
          ))?;
          stmt
            .query_map(
              rusqlite::params![user_str, snapshot, limit, offset],
              RawEntry::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };

        tx.commit()?;
        Ok(Ok((rows, total, snapshot)))
      })
      .await??;

    let items = raws
      .into_iter()
      .map(RawEntry::into_entry)
      .collect::<Result<Vec<_>>>()?;

    Ok(Page {
      items,
      pagination: Pagination::new(&page, total.max(0) as u64, Some(snapshot)),
    })
  }

  // ── Integrity ─────────────────────────────────────────────────────────────

  async fn reconcile(&self, user_id: Uuid) -> Result<Reconciliation> {
    let user_str = encode_uuid(user_id);

    let row: Option<(i64, i64)> = self
      .conn
      .call(move |conn| Ok(read_reconciliation(conn, &user_str)?))
      .await?;

    let (cached_balance, ledger_sum) = row.ok_or(LedgerError::UserNotFound(user_id))?;
    Ok(Reconciliation { user_id, cached_balance, ledger_sum })
  }

  async fn reconcile_all(&self) -> Result<Vec<Reconciliation>> {
    let rows: Vec<(String, i64, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT u.user_id, u.fidelity_points, COALESCE(SUM(e.points), 0) AS ledger_sum
             FROM users u
             LEFT JOIN fidelity_ledger_entries e ON e.user_id = u.user_id
            GROUP BY u.user_id
           HAVING u.fidelity_points != ledger_sum
            ORDER BY u.user_id",
        )?;
        let rows = stmt
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    rows
      .into_iter()
      .map(|(id, cached_balance, ledger_sum)| -> Result<Reconciliation> {
        Ok(Reconciliation {
          user_id: decode_uuid(&id)?,
          cached_balance,
          ledger_sum,
        })
      })
      .collect()
  }

  async fn repair_balance(&self, user_id: Uuid) -> Result<Reconciliation> {
    let user_str = encode_uuid(user_id);

    let (cached_balance, ledger_sum) = self
      .conn
      .call(move |conn| -> Outcome<(i64, i64)> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some((cached, sum)) = read_reconciliation(&tx, &user_str)? else {
          return Ok(Err(LedgerError::UserNotFound(user_id).into()));
        };
        if cached != sum {
          tx.execute(
            "UPDATE users SET fidelity_points = ?1 WHERE user_id = ?2",
            rusqlite::params![sum, user_str],
          )?;
        }
        tx.commit()?;
        Ok(Ok((cached, sum)))
      })
      .await??;

    Ok(Reconciliation { user_id, cached_balance, ledger_sum })
  }
}
