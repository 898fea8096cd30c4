mod fragmentation;
mod handshake;
mod retransmit;
mod socket;
