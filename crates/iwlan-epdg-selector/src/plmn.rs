//! FQDN construction for the `PLMN` address source, per 3GPP TS 23.003
//! §19.4.2.4.

/// A Mobile Country Code / Mobile Network Code pair identifying a PLMN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlmnId {
    pub mcc: String,
    pub mnc: String,
}

impl PlmnId {
    pub fn new(mcc: impl Into<String>, mnc: impl Into<String>) -> Self {
        Self {
            mcc: mcc.into(),
            mnc: mnc.into(),
        }
    }

    /// `epdg.epc.mnc<MNC>.mcc<MCC>.pub.3gppnetwork.org`, zero-padding a
    /// two-digit MNC to three digits as TS 23.003 requires.
    pub fn epdg_fqdn(&self) -> String {
        let mnc = if self.mnc.len() == 2 {
            format!("0{}", self.mnc)
        } else {
            self.mnc.clone()
        };

        format!("epdg.epc.mnc{mnc}.mcc{}.pub.3gppnetwork.org", self.mcc)
    }
}
