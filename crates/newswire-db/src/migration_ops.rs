use redb_bincode::{ReadableTable as _, WriteTransaction};
use tracing::{debug, info};

use crate::{
    Database, DbResult, DbVersionTooHighSnafu, LOG_TARGET, articles, articles_by_published,
    db_version,
};

impl Database {
    pub(crate) fn init_tables_tx(tx: &WriteTransaction) -> DbResult<()> {
        tx.open_table(&db_version::TABLE)?;

        tx.open_table(&articles::TABLE)?;
        tx.open_table(&articles_by_published::TABLE)?;
        Ok(())
    }

    pub(crate) fn handle_db_ver_migrations(dbtx: &WriteTransaction) -> DbResult<()> {
        const DB_VER: u64 = 1;

        let mut table_db_ver = dbtx.open_table(&db_version::TABLE)?;

        let Some(cur_db_ver) = table_db_ver.get(&())?.map(|g| g.value()) else {
            info!(target: LOG_TARGET, "Initializing new database");
            table_db_ver.insert(&(), &DB_VER)?;

            return Ok(());
        };

        if DB_VER < cur_db_ver {
            return DbVersionTooHighSnafu {
                db_ver: cur_db_ver,
                code_ver: DB_VER,
            }
            .fail();
        }

        // No schema changes yet; version 1 is the first one.
        table_db_ver.insert(&(), &DB_VER)?;
        debug!(target: LOG_TARGET, db_ver = DB_VER, "Db version");

        Ok(())
    }
}
