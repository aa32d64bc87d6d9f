use kernel::id::Id;

pub struct SessionMarker;
pub type SessionId = Id<SessionMarker>;

pub struct PasswordResetTokenMarker;
pub type PasswordResetTokenId = Id<PasswordResetTokenMarker>;
