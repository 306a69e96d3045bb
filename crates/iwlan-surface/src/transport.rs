//! Default-data-transport classification and the gating rule it feeds
//! ("transport gating", "force-close above").

/// What the default-network callback classifies the current connection
/// as. `Unspec` never satisfies gating and never triggers a force-close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Cellular,
    Wifi,
    Unspec,
}

/// A tunnel bring-up is permitted iff (default-data-slot AND transport =
/// WIFI) OR (non-default slot AND cross-SIM-calling-enabled AND any known
/// transport).
pub(crate) fn is_bring_up_permitted(
    transport: Transport,
    is_default_data_slot: bool,
    cross_sim_calling_enabled: bool,
) -> bool {
    match transport {
        Transport::Unspec => false,
        Transport::Wifi if is_default_data_slot => true,
        _ if !is_default_data_slot && cross_sim_calling_enabled => true,
        _ => false,
    }
}
