use strum::FromRepr;

/// All vendor message ids share this high-word marker.
pub const MSG_ID_BASE: u32 = 0xFFFF_0000;

/// Raw message ids delivered to the session callback.
///
/// Values are the runtime's wire-compatible identifiers. The set the bridge
/// understands is deliberately a subset; ids outside this enum are ignorable
/// by contract.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
pub enum VendorMsgId {
    ConnectComplete = MSG_ID_BASE | 0x0005,
    CreatePlayer = MSG_ID_BASE | 0x0007,
    DestroyPlayer = MSG_ID_BASE | 0x0009,
    EnumHostsQuery = MSG_ID_BASE | 0x000A,
    IndicateConnect = MSG_ID_BASE | 0x000E,
    Receive = MSG_ID_BASE | 0x0011,
    ReturnBuffer = MSG_ID_BASE | 0x0013,
    SendComplete = MSG_ID_BASE | 0x0014,
    TerminateSession = MSG_ID_BASE | 0x0016,
}

impl VendorMsgId {
    /// Short uppercase name used in logs.
    pub const fn name(self) -> &'static str {
        match self {
            VendorMsgId::ConnectComplete => "CONNECT_COMPLETE",
            VendorMsgId::CreatePlayer => "CREATE_PLAYER",
            VendorMsgId::DestroyPlayer => "DESTROY_PLAYER",
            VendorMsgId::EnumHostsQuery => "ENUM_HOSTS_QUERY",
            VendorMsgId::IndicateConnect => "INDICATE_CONNECT",
            VendorMsgId::Receive => "RECEIVE",
            VendorMsgId::ReturnBuffer => "RETURN_BUFFER",
            VendorMsgId::SendComplete => "SEND_COMPLETE",
            VendorMsgId::TerminateSession => "TERMINATE_SESSION",
        }
    }
}

/// Log-friendly name for an arbitrary raw id. Unknown ids render as hex.
pub fn msg_name(raw: u32) -> String {
    match VendorMsgId::from_repr(raw) {
        Some(id) => id.name().to_owned(),
        None => format!("{raw:#010X}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_ids() {
        for id in [
            VendorMsgId::ConnectComplete,
            VendorMsgId::CreatePlayer,
            VendorMsgId::DestroyPlayer,
            VendorMsgId::EnumHostsQuery,
            VendorMsgId::IndicateConnect,
            VendorMsgId::Receive,
            VendorMsgId::ReturnBuffer,
            VendorMsgId::SendComplete,
            VendorMsgId::TerminateSession,
        ] {
            assert_eq!(VendorMsgId::from_repr(id as u32), Some(id));
        }
    }

    #[test]
    fn unknown_ids_render_as_hex() {
        assert_eq!(VendorMsgId::from_repr(MSG_ID_BASE | 0x00FF), None);
        assert_eq!(msg_name(MSG_ID_BASE | 0x00FF), "0xFFFF00FF");
        assert_eq!(msg_name(VendorMsgId::Receive as u32), "RECEIVE");
    }
}
