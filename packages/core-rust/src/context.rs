/// Tenant used when a request names none.
pub const DEFAULT_TENANT: &str = "default";

/// Per-request tenant identity, derived by the gateway's tenant middleware.
/// Threaded into every inventory and subscription operation for isolation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantContext {
    /// Tenant scope of the request.
    pub tenant_id: String,
    /// Platform admins see and mutate objects of every tenant.
    pub is_platform_admin: bool,
}

impl TenantContext {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            is_platform_admin: false,
        }
    }

    #[must_use]
    pub fn platform_admin(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            is_platform_admin: true,
        }
    }

    /// Checks whether this tenant may observe an object owned by `owner`.
    /// Objects with no recorded owner belong to the default tenant.
    #[must_use]
    pub fn can_access(&self, owner: Option<&str>) -> bool {
        self.is_platform_admin || owner.unwrap_or(DEFAULT_TENANT) == self.tenant_id
    }
}

impl Default for TenantContext {
    fn default() -> Self {
        Self::new(DEFAULT_TENANT)
    }
}
