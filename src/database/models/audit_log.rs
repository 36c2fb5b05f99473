/// Actions recorded in a campus `audit_logs` table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    CreateVehicle,
    MarkArrival,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::CreateVehicle => "CREATE_VEHICLE",
            AuditAction::MarkArrival => "MARK_ARRIVAL",
        }
    }
}
