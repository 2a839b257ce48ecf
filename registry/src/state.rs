use sqlx::SqlitePool;

use crate::admission::AdmissionController;
use crate::config::AdmissionScope;
use crate::directory::LocationDirectory;
use crate::ledger::ExecutionLedger;
use crate::params::ParamStore;
use crate::selector::WorkerSelector;

pub struct AppState {
    pub ledger: ExecutionLedger,
    pub admission: AdmissionController,
    pub directory: LocationDirectory,
    pub selector: WorkerSelector,
    pub params: ParamStore,
}

impl AppState {
    pub fn new(db: SqlitePool, admission_scope: AdmissionScope) -> Self {
        let ledger = ExecutionLedger::new(db.clone());
        let directory = LocationDirectory::new(db.clone());
        Self {
            admission: AdmissionController::new(ledger.clone(), admission_scope),
            selector: WorkerSelector::new(ledger.clone(), directory.clone()),
            params: ParamStore::new(db),
            ledger,
            directory,
        }
    }
}
